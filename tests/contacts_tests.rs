//! Integration tests for the Shared Contacts feed against a local server.

use google_workspace::types::{ContactEntry, Email, Link, Name, REL_SELF, REL_WORK};
use google_workspace::{WorkspaceClient, WorkspaceConfig, ReqwestTransport};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_PATH: &str = "/m8/feeds/contacts/example.com/full";

async fn create_test_client() -> (WorkspaceClient, MockServer) {
    let mock_server = MockServer::start().await;
    let config = WorkspaceConfig::builder()
        .base_url(mock_server.uri())
        .no_pacing()
        .build()
        .unwrap();
    let transport = ReqwestTransport::from_config(&config).unwrap();
    let client = WorkspaceClient::builder()
        .transport(transport)
        .config(config)
        .build()
        .unwrap();
    (client, mock_server)
}

fn entry_xml(server: &str, id: u32, email: &str) -> String {
    format!(
        r#"<entry xmlns='http://www.w3.org/2005/Atom' xmlns:gd='http://schemas.google.com/g/2005'>
  <id>{server}{FEED_PATH}/{id}</id>
  <title>Contact {id}</title>
  <link rel='self' type='application/atom+xml' href='{server}{FEED_PATH}/{id}'/>
  <gd:email rel='http://schemas.google.com/g/2005#work' primary='true' address='{email}'/>
</entry>"#
    )
}

fn feed_xml(entries: &[String], next: Option<&str>) -> String {
    let next = next
        .map(|href| format!("<link rel='next' type='application/atom+xml' href='{}'/>", href))
        .unwrap_or_default();
    format!(
        "<?xml version='1.0' encoding='UTF-8'?>\n<feed xmlns='http://www.w3.org/2005/Atom'>{}{}</feed>",
        next,
        entries.join("")
    )
}

fn atom(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/atom+xml")
        .set_body_string(body)
}

#[tokio::test]
async fn test_stream_follows_next_links() {
    let (client, server) = create_test_client().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("start-index", "2"))
        .respond_with(atom(feed_xml(&[entry_xml(&uri, 2, "b@example.com")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let next = format!("{}{}?v=3.0&max-results=1000&start-index=2", uri, FEED_PATH);
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("v", "3.0"))
        .and(query_param("max-results", "1000"))
        .and(header("gdata-version", "3.0"))
        .respond_with(atom(feed_xml(
            &[entry_xml(&uri, 1, "a@example.com")],
            Some(&next),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let stream = client
        .contacts()
        .stream("example.com", 10, CancellationToken::new())
        .await
        .unwrap();
    let entries = stream.collect().await.unwrap();

    let emails: Vec<_> = entries.iter().filter_map(|e| e.primary_email()).collect();
    assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
}

#[tokio::test]
async fn test_create_posts_atom_entry() {
    let (client, server) = create_test_client().await;
    let uri = server.uri();

    Mock::given(method("POST"))
        .and(path(FEED_PATH))
        .and(header("gdata-version", "3.0"))
        .and(header("content-type", "application/atom+xml"))
        .and(body_string_contains("address=\"new@example.com\""))
        .respond_with(atom(entry_xml(&uri, 7, "new@example.com")))
        .expect(1)
        .mount(&server)
        .await;

    let entry = ContactEntry {
        title: Some("New Contact".to_string()),
        name: Some(Name {
            given_name: Some("New".to_string()),
            family_name: Some("Contact".to_string()),
            ..Default::default()
        }),
        emails: vec![Email {
            address: "new@example.com".to_string(),
            rel: Some(REL_WORK.to_string()),
            primary: true,
            ..Default::default()
        }],
        ..Default::default()
    };

    let created = client.contacts().create("example.com", &entry).await.unwrap();
    assert_eq!(
        created.self_link(),
        Some(format!("{}{}/7", uri, FEED_PATH).as_str())
    );
}

#[tokio::test]
async fn test_update_and_delete_send_if_match() {
    let (client, server) = create_test_client().await;
    let uri = server.uri();
    let self_link = format!("{}{}/3", uri, FEED_PATH);

    Mock::given(method("PUT"))
        .and(path(format!("{}/3", FEED_PATH)))
        .and(header("if-match", "*"))
        .and(header("gdata-version", "3.0"))
        .respond_with(atom(entry_xml(&uri, 3, "renamed@example.com")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/3", FEED_PATH)))
        .and(header("if-match", "*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let entry = ContactEntry {
        links: vec![Link {
            rel: REL_SELF.to_string(),
            href: self_link.clone(),
            ..Default::default()
        }],
        emails: vec![Email {
            address: "renamed@example.com".to_string(),
            primary: true,
            ..Default::default()
        }],
        ..Default::default()
    };

    let updated = client.contacts().update(&entry).await.unwrap();
    assert_eq!(updated.primary_email(), Some("renamed@example.com"));

    client.contacts().delete(&self_link).await.unwrap();
}

#[tokio::test]
async fn test_update_without_self_link_fails() {
    let (client, _server) = create_test_client().await;
    let result = client.contacts().update(&ContactEntry::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_api_error_is_keyed_by_domain() {
    let (client, server) = create_test_client().await;

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("Domain not found"))
        .mount(&server)
        .await;

    let error = client.contacts().list("example.com").await.unwrap_err();
    assert_eq!(error.key(), Some("example.com"));
    assert_eq!(error.status_code().map(|s| s.as_u16()), Some(404));
}
