//! XML codec for the Shared Contacts feed.
//!
//! Responses use Atom as the default namespace while requests are written with
//! explicit `atom:` and `gd:` prefixes, so elements are matched by local name.

use crate::errors::{ResponseError, WorkspaceError, WorkspaceResult};
use crate::types::contacts::*;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::fmt;

/// Atom namespace.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// GData namespace.
pub const GD_NS: &str = "http://schemas.google.com/g/2005";

/// Contacts namespace.
pub const GCONTACT_NS: &str = "http://schemas.google.com/contact/2008";

const KIND_SCHEME: &str = "http://schemas.google.com/g/2005#kind";
const CONTACT_KIND: &str = "http://schemas.google.com/contact/2008#contact";

/// Parse a contacts feed page.
pub fn parse_feed(xml: &str) -> WorkspaceResult<ContactFeed> {
    let mut parser = FeedParser::default();
    parser.run(xml)?;
    Ok(parser.feed)
}

/// Parse a single contact entry.
pub fn parse_entry(xml: &str) -> WorkspaceResult<ContactEntry> {
    parse_feed(xml)?
        .entries
        .into_iter()
        .next()
        .ok_or_else(|| {
            WorkspaceError::Response(ResponseError::UnexpectedFormat(
                "response contains no contact entry".to_string(),
            ))
        })
}

fn xml_error(err: impl fmt::Display) -> WorkspaceError {
    WorkspaceError::Response(ResponseError::XmlParseError(err.to_string()))
}

fn local(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_string()
}

fn attributes(e: &BytesStart<'_>) -> WorkspaceResult<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?.to_string();
        attrs.insert(local(attr.key.local_name().as_ref()), value);
    }
    Ok(attrs)
}

fn flag(attrs: &HashMap<String, String>, name: &str) -> bool {
    attrs.get(name).map(|v| v == "true").unwrap_or(false)
}

#[derive(Default)]
struct FeedParser {
    feed: ContactFeed,
    entry: Option<ContactEntry>,
    path: Vec<String>,
    text: String,
}

impl FeedParser {
    fn run(&mut self, xml: &str) -> WorkspaceResult<()> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(e) => {
                    let name = local(e.local_name().as_ref());
                    let attrs = attributes(&e)?;
                    self.open(name, attrs);
                }
                Event::Empty(e) => {
                    let name = local(e.local_name().as_ref());
                    let attrs = attributes(&e)?;
                    self.open(name, attrs);
                    self.close();
                }
                Event::Text(e) => {
                    self.text.push_str(&e.unescape().map_err(xml_error)?);
                }
                Event::CData(e) => {
                    self.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
                Event::End(_) => self.close(),
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(())
    }

    fn parent(&self) -> &str {
        self.path
            .len()
            .checked_sub(2)
            .and_then(|i| self.path.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn grandparent(&self) -> &str {
        self.path
            .len()
            .checked_sub(3)
            .and_then(|i| self.path.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn open(&mut self, name: String, attrs: HashMap<String, String>) {
        self.text.clear();
        self.path.push(name);

        let name = self.path.last().map(String::as_str).unwrap_or("");
        if name == "entry" {
            self.entry = Some(ContactEntry {
                etag: attrs.get("etag").cloned(),
                ..Default::default()
            });
            return;
        }

        let parent = self.parent().to_string();
        let grandparent = self.grandparent().to_string();
        let name = name.to_string();

        let Some(entry) = self.entry.as_mut() else {
            if name == "link" && parent == "feed" {
                self.feed.links.push(link(&attrs));
            }
            return;
        };

        match name.as_str() {
            "link" if parent == "entry" => entry.links.push(link(&attrs)),
            "name" if parent == "entry" => entry.name = Some(Name::default()),
            "email" => entry.emails.push(Email {
                address: attrs.get("address").cloned().unwrap_or_default(),
                display_name: attrs.get("displayName").cloned(),
                label: attrs.get("label").cloned(),
                rel: attrs.get("rel").cloned(),
                primary: flag(&attrs, "primary"),
            }),
            "phoneNumber" => entry.phone_numbers.push(PhoneNumber {
                number: String::new(),
                label: attrs.get("label").cloned(),
                rel: attrs.get("rel").cloned(),
                uri: attrs.get("uri").cloned(),
                primary: flag(&attrs, "primary"),
            }),
            "im" => entry.ims.push(Im {
                address: attrs.get("address").cloned().unwrap_or_default(),
                label: attrs.get("label").cloned(),
                rel: attrs.get("rel").cloned(),
                protocol: attrs.get("protocol").cloned(),
                primary: flag(&attrs, "primary"),
            }),
            "structuredPostalAddress" => {
                entry
                    .structured_postal_addresses
                    .push(StructuredPostalAddress {
                        rel: attrs.get("rel").cloned(),
                        mail_class: attrs.get("mailClass").cloned(),
                        usage: attrs.get("usage").cloned(),
                        label: attrs.get("label").cloned(),
                        primary: flag(&attrs, "primary"),
                        ..Default::default()
                    })
            }
            "postalAddress" => entry.postal_addresses.push(PostalAddress {
                value: String::new(),
                label: attrs.get("label").cloned(),
                rel: attrs.get("rel").cloned(),
                primary: flag(&attrs, "primary"),
            }),
            "organization" => entry.organizations.push(Organization {
                label: attrs.get("label").cloned(),
                rel: attrs.get("rel").cloned(),
                primary: flag(&attrs, "primary"),
                ..Default::default()
            }),
            "extendedProperty" => entry.extended_properties.push(ExtendedProperty {
                name: attrs.get("name").cloned().unwrap_or_default(),
                value: attrs.get("value").cloned(),
                realm: attrs.get("realm").cloned(),
            }),
            "where" => {
                let place = Where {
                    label: attrs.get("label").cloned(),
                    rel: attrs.get("rel").cloned(),
                    value_string: attrs.get("valueString").cloned(),
                    entry_link: None,
                };
                if parent == "organization" {
                    if let Some(org) = entry.organizations.last_mut() {
                        org.where_ = Some(place);
                    }
                } else if parent == "entry" {
                    entry.wheres.push(place);
                }
            }
            "entryLink" if parent == "where" => {
                let link = EntryLink {
                    href: attrs.get("href").cloned(),
                    read_only: flag(&attrs, "readOnly"),
                    rel: attrs.get("rel").cloned(),
                };
                let place = if grandparent == "organization" {
                    entry
                        .organizations
                        .last_mut()
                        .and_then(|org| org.where_.as_mut())
                } else {
                    entry.wheres.last_mut()
                };
                if let Some(place) = place {
                    place.entry_link = Some(link);
                }
            }
            _ => {}
        }
    }

    fn close(&mut self) {
        let text = std::mem::take(&mut self.text);
        let parent = self.parent().to_string();
        let Some(name) = self.path.pop() else {
            return;
        };

        if name == "entry" {
            if let Some(entry) = self.entry.take() {
                self.feed.entries.push(entry);
            }
            return;
        }

        let value = (!text.is_empty()).then(|| text.clone());

        let Some(entry) = self.entry.as_mut() else {
            match (parent.as_str(), name.as_str()) {
                ("feed", "id") => self.feed.id = value,
                ("feed", "totalResults") => self.feed.total_results = text.parse().ok(),
                _ => {}
            }
            return;
        };

        match (parent.as_str(), name.as_str()) {
            ("entry", "id") => entry.id = value,
            ("entry", "updated") => entry.updated = value,
            ("entry", "title") => entry.title = value,
            ("entry", "content") => entry.content = value,
            ("entry", "phoneNumber") => {
                if let Some(phone) = entry.phone_numbers.last_mut() {
                    phone.number = text;
                }
            }
            ("entry", "postalAddress") => {
                if let Some(address) = entry.postal_addresses.last_mut() {
                    address.value = text;
                }
            }
            ("name", field) => {
                if let Some(name) = entry.name.as_mut() {
                    match field {
                        "givenName" => name.given_name = value,
                        "additionalName" => name.additional_name = value,
                        "familyName" => name.family_name = value,
                        "namePrefix" => name.name_prefix = value,
                        "nameSuffix" => name.name_suffix = value,
                        "fullName" => name.full_name = value,
                        _ => {}
                    }
                }
            }
            ("structuredPostalAddress", field) => {
                if let Some(address) = entry.structured_postal_addresses.last_mut() {
                    match field {
                        "agent" => address.agent = value,
                        "housename" => address.house_name = value,
                        "street" => address.street = value,
                        "pobox" => address.po_box = value,
                        "neighborhood" => address.neighborhood = value,
                        "city" => address.city = value,
                        "subregion" => address.subregion = value,
                        "region" => address.region = value,
                        "postcode" => address.postcode = value,
                        "country" => address.country = value,
                        "formattedAddress" => address.formatted_address = value,
                        _ => {}
                    }
                }
            }
            ("organization", field) => {
                if let Some(org) = entry.organizations.last_mut() {
                    match field {
                        "orgName" => org.org_name = value,
                        "orgDepartment" => org.org_department = value,
                        "orgJobDescription" => org.org_job_description = value,
                        "orgSymbol" => org.org_symbol = value,
                        "orgTitle" => org.org_title = value,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

fn link(attrs: &HashMap<String, String>) -> Link {
    Link {
        rel: attrs.get("rel").cloned().unwrap_or_default(),
        link_type: attrs.get("type").cloned(),
        href: attrs.get("href").cloned().unwrap_or_default(),
    }
}

/// Serialize a contact entry as a request body.
pub fn write_entry(entry: &ContactEntry) -> WorkspaceResult<String> {
    let mut w = ElementWriter::new();
    w.decl()?;
    w.start(
        "atom:entry",
        &[
            ("xmlns:atom", Some(ATOM_NS)),
            ("xmlns:gd", Some(GD_NS)),
            ("xmlns:gContact", Some(GCONTACT_NS)),
        ],
    )?;
    w.empty(
        "atom:category",
        &[("scheme", Some(KIND_SCHEME)), ("term", Some(CONTACT_KIND))],
    )?;

    w.opt_text("atom:id", entry.id.as_deref())?;
    w.opt_text("atom:title", entry.title.as_deref())?;
    if let Some(content) = &entry.content {
        w.text("atom:content", &[("type", Some("text"))], content)?;
    }

    if let Some(name) = entry.name.as_ref().filter(|name| !name.is_empty()) {
        w.start("gd:name", &[])?;
        w.opt_text("gd:givenName", name.given_name.as_deref())?;
        w.opt_text("gd:additionalName", name.additional_name.as_deref())?;
        w.opt_text("gd:familyName", name.family_name.as_deref())?;
        w.opt_text("gd:namePrefix", name.name_prefix.as_deref())?;
        w.opt_text("gd:nameSuffix", name.name_suffix.as_deref())?;
        w.opt_text("gd:fullName", name.full_name.as_deref())?;
        w.end("gd:name")?;
    }

    for email in &entry.emails {
        w.empty(
            "gd:email",
            &[
                ("address", Some(email.address.as_str())),
                ("displayName", email.display_name.as_deref()),
                ("label", email.label.as_deref()),
                ("rel", email.rel.as_deref()),
                ("primary", primary(email.primary)),
            ],
        )?;
    }

    for phone in &entry.phone_numbers {
        w.text(
            "gd:phoneNumber",
            &[
                ("label", phone.label.as_deref()),
                ("rel", phone.rel.as_deref()),
                ("uri", phone.uri.as_deref()),
                ("primary", primary(phone.primary)),
            ],
            &phone.number,
        )?;
    }

    for im in &entry.ims {
        w.empty(
            "gd:im",
            &[
                ("address", Some(im.address.as_str())),
                ("label", im.label.as_deref()),
                ("rel", im.rel.as_deref()),
                ("protocol", im.protocol.as_deref()),
                ("primary", primary(im.primary)),
            ],
        )?;
    }

    for address in &entry.structured_postal_addresses {
        w.start(
            "gd:structuredPostalAddress",
            &[
                ("rel", address.rel.as_deref()),
                ("mailClass", address.mail_class.as_deref()),
                ("usage", address.usage.as_deref()),
                ("label", address.label.as_deref()),
                ("primary", primary(address.primary)),
            ],
        )?;
        w.opt_text("gd:agent", address.agent.as_deref())?;
        w.opt_text("gd:housename", address.house_name.as_deref())?;
        w.opt_text("gd:street", address.street.as_deref())?;
        w.opt_text("gd:pobox", address.po_box.as_deref())?;
        w.opt_text("gd:neighborhood", address.neighborhood.as_deref())?;
        w.opt_text("gd:city", address.city.as_deref())?;
        w.opt_text("gd:subregion", address.subregion.as_deref())?;
        w.opt_text("gd:region", address.region.as_deref())?;
        w.opt_text("gd:postcode", address.postcode.as_deref())?;
        w.opt_text("gd:country", address.country.as_deref())?;
        w.opt_text("gd:formattedAddress", address.formatted_address.as_deref())?;
        w.end("gd:structuredPostalAddress")?;
    }

    for address in &entry.postal_addresses {
        w.text(
            "gd:postalAddress",
            &[
                ("label", address.label.as_deref()),
                ("rel", address.rel.as_deref()),
                ("primary", primary(address.primary)),
            ],
            &address.value,
        )?;
    }

    for org in &entry.organizations {
        w.start(
            "gd:organization",
            &[
                ("label", org.label.as_deref()),
                ("rel", org.rel.as_deref()),
                ("primary", primary(org.primary)),
            ],
        )?;
        w.opt_text("gd:orgName", org.org_name.as_deref())?;
        w.opt_text("gd:orgDepartment", org.org_department.as_deref())?;
        w.opt_text("gd:orgJobDescription", org.org_job_description.as_deref())?;
        w.opt_text("gd:orgSymbol", org.org_symbol.as_deref())?;
        w.opt_text("gd:orgTitle", org.org_title.as_deref())?;
        if let Some(place) = &org.where_ {
            w.place(place)?;
        }
        w.end("gd:organization")?;
    }

    for property in &entry.extended_properties {
        w.empty(
            "gd:extendedProperty",
            &[
                ("name", Some(property.name.as_str())),
                ("value", property.value.as_deref()),
                ("realm", property.realm.as_deref()),
            ],
        )?;
    }

    for place in &entry.wheres {
        w.place(place)?;
    }

    w.end("atom:entry")?;
    w.finish()
}

fn primary(value: bool) -> Option<&'static str> {
    value.then_some("true")
}

type Attrs<'a> = [(&'a str, Option<&'a str>)];

struct ElementWriter {
    writer: Writer<Vec<u8>>,
}

impl ElementWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn element<'a>(name: &'a str, attrs: &Attrs<'a>) -> BytesStart<'a> {
        let mut element = BytesStart::new(name);
        for (key, value) in attrs {
            if let Some(value) = value {
                element.push_attribute((*key, *value));
            }
        }
        element
    }

    fn decl(&mut self) -> WorkspaceResult<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)
    }

    fn start(&mut self, name: &str, attrs: &Attrs<'_>) -> WorkspaceResult<()> {
        self.writer
            .write_event(Event::Start(Self::element(name, attrs)))
            .map_err(xml_error)
    }

    fn end(&mut self, name: &str) -> WorkspaceResult<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    fn empty(&mut self, name: &str, attrs: &Attrs<'_>) -> WorkspaceResult<()> {
        self.writer
            .write_event(Event::Empty(Self::element(name, attrs)))
            .map_err(xml_error)
    }

    fn text(&mut self, name: &str, attrs: &Attrs<'_>, text: &str) -> WorkspaceResult<()> {
        self.start(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
        self.end(name)
    }

    fn opt_text(&mut self, name: &str, text: Option<&str>) -> WorkspaceResult<()> {
        match text {
            Some(text) => self.text(name, &[], text),
            None => Ok(()),
        }
    }

    fn place(&mut self, place: &Where) -> WorkspaceResult<()> {
        let attrs = [
            ("label", place.label.as_deref()),
            ("rel", place.rel.as_deref()),
            ("valueString", place.value_string.as_deref()),
        ];
        match &place.entry_link {
            None => self.empty("gd:where", &attrs),
            Some(link) => {
                self.start("gd:where", &attrs)?;
                self.empty(
                    "gd:entryLink",
                    &[
                        ("href", link.href.as_deref()),
                        ("readOnly", Some(if link.read_only { "true" } else { "false" })),
                        ("rel", link.rel.as_deref()),
                    ],
                )?;
                self.end("gd:where")
            }
        }
    }

    fn finish(self) -> WorkspaceResult<String> {
        String::from_utf8(self.writer.into_inner()).map_err(xml_error)
    }
}
