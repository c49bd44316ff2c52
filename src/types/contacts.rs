//! Shared Contacts (GData v3) entry and feed models.
//!
//! These mirror the attribute and child structure of the legacy XML feed; see
//! [`crate::xml`] for the wire codec.

/// `rel` value of a work address, email or phone number.
pub const REL_WORK: &str = "http://schemas.google.com/g/2005#work";

/// `rel` value of a home address, email or phone number.
pub const REL_HOME: &str = "http://schemas.google.com/g/2005#home";

/// `rel` value of the self link.
pub const REL_SELF: &str = "self";

/// `rel` value of the edit link.
pub const REL_EDIT: &str = "edit";

/// `rel` value of the next page link.
pub const REL_NEXT: &str = "next";

/// A structured contact name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name {
    /// Given name.
    pub given_name: Option<String>,
    /// Additional (middle) name.
    pub additional_name: Option<String>,
    /// Family name.
    pub family_name: Option<String>,
    /// Honorific prefix.
    pub name_prefix: Option<String>,
    /// Honorific suffix.
    pub name_suffix: Option<String>,
    /// Unstructured full name.
    pub full_name: Option<String>,
}

impl Name {
    /// Returns true when no part is set.
    pub fn is_empty(&self) -> bool {
        self.given_name.is_none()
            && self.additional_name.is_none()
            && self.family_name.is_none()
            && self.name_prefix.is_none()
            && self.name_suffix.is_none()
            && self.full_name.is_none()
    }
}

/// An email address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    /// The address.
    pub address: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Free-form label.
    pub label: Option<String>,
    /// Kind, e.g. [`REL_WORK`].
    pub rel: Option<String>,
    /// Whether this is the primary address.
    pub primary: bool,
}

/// A phone number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneNumber {
    /// The number as text content.
    pub number: String,
    /// Free-form label.
    pub label: Option<String>,
    /// Kind, e.g. [`REL_WORK`].
    pub rel: Option<String>,
    /// `tel:` URI.
    pub uri: Option<String>,
    /// Whether this is the primary number.
    pub primary: bool,
}

/// An instant messaging address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Im {
    /// The IM address.
    pub address: String,
    /// Free-form label.
    pub label: Option<String>,
    /// Kind.
    pub rel: Option<String>,
    /// IM network.
    pub protocol: Option<String>,
    /// Whether this is the primary address.
    pub primary: bool,
}

/// A postal address broken into parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredPostalAddress {
    /// Kind.
    pub rel: Option<String>,
    /// Mail class.
    pub mail_class: Option<String>,
    /// Usage.
    pub usage: Option<String>,
    /// Free-form label.
    pub label: Option<String>,
    /// Whether this is the primary address.
    pub primary: bool,
    /// Agent.
    pub agent: Option<String>,
    /// House name.
    pub house_name: Option<String>,
    /// Street.
    pub street: Option<String>,
    /// PO box.
    pub po_box: Option<String>,
    /// Neighborhood.
    pub neighborhood: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Subregion.
    pub subregion: Option<String>,
    /// Region.
    pub region: Option<String>,
    /// Postcode.
    pub postcode: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Full formatted address.
    pub formatted_address: Option<String>,
}

/// An unstructured postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalAddress {
    /// The address as text content.
    pub value: String,
    /// Free-form label.
    pub label: Option<String>,
    /// Kind.
    pub rel: Option<String>,
    /// Whether this is the primary address.
    pub primary: bool,
}

/// An organization the contact belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Organization {
    /// Free-form label.
    pub label: Option<String>,
    /// Kind.
    pub rel: Option<String>,
    /// Whether this is the primary organization.
    pub primary: bool,
    /// Organization name.
    pub org_name: Option<String>,
    /// Department.
    pub org_department: Option<String>,
    /// Job description.
    pub org_job_description: Option<String>,
    /// Stock symbol.
    pub org_symbol: Option<String>,
    /// Job title.
    pub org_title: Option<String>,
    /// Location.
    pub where_: Option<Where>,
}

/// A place, optionally linking to another entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Where {
    /// Free-form label.
    pub label: Option<String>,
    /// Kind.
    pub rel: Option<String>,
    /// Place description.
    pub value_string: Option<String>,
    /// Linked entry.
    pub entry_link: Option<EntryLink>,
}

/// Link to another entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryLink {
    /// Target URL.
    pub href: Option<String>,
    /// Whether the target is read only.
    pub read_only: bool,
    /// Kind.
    pub rel: Option<String>,
}

/// An application-defined property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedProperty {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: Option<String>,
    /// Realm.
    pub realm: Option<String>,
}

/// An Atom link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    /// Relation.
    pub rel: String,
    /// MIME type.
    pub link_type: Option<String>,
    /// Target URL.
    pub href: String,
}

/// One shared contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactEntry {
    /// Atom ID.
    pub id: Option<String>,
    /// Entry ETag.
    pub etag: Option<String>,
    /// Last update timestamp.
    pub updated: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Notes.
    pub content: Option<String>,
    /// Structured name.
    pub name: Option<Name>,
    /// Email addresses.
    pub emails: Vec<Email>,
    /// Phone numbers.
    pub phone_numbers: Vec<PhoneNumber>,
    /// IM addresses.
    pub ims: Vec<Im>,
    /// Structured postal addresses.
    pub structured_postal_addresses: Vec<StructuredPostalAddress>,
    /// Unstructured postal addresses.
    pub postal_addresses: Vec<PostalAddress>,
    /// Organizations.
    pub organizations: Vec<Organization>,
    /// Extended properties.
    pub extended_properties: Vec<ExtendedProperty>,
    /// Places.
    pub wheres: Vec<Where>,
    /// Atom links.
    pub links: Vec<Link>,
}

impl ContactEntry {
    /// Returns the href of the link with relation `rel`.
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == rel)
            .map(|link| link.href.as_str())
    }

    /// Returns the self link, the address of get, update and delete calls.
    pub fn self_link(&self) -> Option<&str> {
        self.link(REL_SELF)
    }

    /// Returns the primary email, or the first one.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|email| email.primary)
            .or_else(|| self.emails.first())
            .map(|email| email.address.as_str())
    }
}

/// One page of the contacts feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFeed {
    /// Feed ID.
    pub id: Option<String>,
    /// Total number of entries across all pages.
    pub total_results: Option<u64>,
    /// Entries on this page.
    pub entries: Vec<ContactEntry>,
    /// Feed links.
    pub links: Vec<Link>,
}

impl ContactFeed {
    /// Returns the URL of the next page, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == REL_NEXT)
            .map(|link| link.href.as_str())
            .filter(|href| !href.is_empty())
    }
}
