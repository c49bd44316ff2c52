//! Type definitions for the Google Workspace APIs used by the core.
//!
//! Models carry the fields the core reads; everything else the API returns is
//! kept verbatim in `extra` so callers can forward it untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod contacts;

pub use contacts::*;

/// MIME type of Drive folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Member type of individual users in a group.
pub const MEMBER_TYPE_USER: &str = "USER";

/// Makes sure a field mask keeps the page cursor of list responses.
pub fn list_fields(fields: Option<String>) -> Option<String> {
    fields.map(|fields| {
        if fields.contains("nextPageToken") {
            fields
        } else {
            format!("nextPageToken,{}", fields)
        }
    })
}

// ============================================================================
// Admin SDK Directory
// ============================================================================

/// A Workspace user account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    #[serde(default)]
    pub id: String,

    /// Primary email address.
    #[serde(default)]
    pub primary_email: String,

    /// Full organizational unit path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,

    /// Whether the account is suspended.
    #[serde(default)]
    pub suspended: bool,

    /// Remaining fields, forwarded as returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of users.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserList {
    /// Users on this page.
    #[serde(default)]
    pub users: Vec<User>,

    /// Cursor of the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Parameters for listing users.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersParams {
    /// Customer ID; defaults to the configured customer when neither this nor `domain` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,

    /// Domain to list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Search query, e.g. `orgUnitPath='/Sales'`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Sort property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,

    /// Sort direction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,

    /// Projection (`basic`, `custom`, `full`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<String>,

    /// Whether to list deleted users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_deleted: Option<bool>,

    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    /// Page token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,

    /// Field mask.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
}

impl ListUsersParams {
    /// Parameters selecting the users of one organizational unit.
    pub fn in_org_unit(org_unit_path: &str) -> Self {
        Self {
            query: Some(format!("orgUnitPath='{}'", org_unit_path)),
            fields: Some("users(primaryEmail)".to_string()),
            max_results: Some(500),
            ..Default::default()
        }
    }
}

/// A member of a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Unique member ID.
    #[serde(default)]
    pub id: String,

    /// Member email address.
    #[serde(default)]
    pub email: String,

    /// Role in the group (`OWNER`, `MANAGER`, `MEMBER`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Member type (`USER`, `GROUP`, `CUSTOMER`, `EXTERNAL`).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,

    /// Membership status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Remaining fields, forwarded as returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Member {
    /// Returns true for individual user members.
    pub fn is_user(&self) -> bool {
        self.member_type.as_deref() == Some(MEMBER_TYPE_USER)
    }
}

/// One page of group members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberList {
    /// Members on this page.
    #[serde(default)]
    pub members: Vec<Member>,

    /// Cursor of the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Parameters for listing group members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMembersParams {
    /// Expand nested groups into their members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_derived_membership: Option<bool>,

    /// Comma separated roles to include.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<String>,

    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    /// Page token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,

    /// Field mask.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
}

impl ListMembersParams {
    /// Parameters for a transitive listing.
    pub fn transitive() -> Self {
        Self {
            include_derived_membership: Some(true),
            max_results: Some(200),
            ..Default::default()
        }
    }
}

/// Request to add a member to a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertMemberRequest {
    /// Member email address.
    pub email: String,

    /// Role in the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Delivery settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_settings: Option<String>,
}

// ============================================================================
// Drive
// ============================================================================

/// A Drive file or folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    #[serde(default)]
    pub id: String,

    /// File name.
    #[serde(default)]
    pub name: String,

    /// MIME type.
    #[serde(default)]
    pub mime_type: String,

    /// Parent folder IDs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,

    /// Shared drive ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,

    /// Whether the file is in trash.
    #[serde(default)]
    pub trashed: bool,

    /// Remaining fields, forwarded as returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DriveFile {
    /// Returns true for folders.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// One page of files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    /// Files on this page.
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Cursor of the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    /// Whether the search was incomplete.
    #[serde(default)]
    pub incomplete_search: bool,
}

/// Parameters for listing files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesParams {
    /// Corpora to search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpora: Option<String>,

    /// Shared drive ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,

    /// Include items from all drives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_items_from_all_drives: Option<bool>,

    /// Order by clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,

    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    /// Page token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,

    /// Query string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    /// Spaces to search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spaces: Option<String>,

    /// Support all drives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_all_drives: Option<bool>,

    /// Fields to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
}

impl ListFilesParams {
    /// Parameters listing the non-trashed children of a folder.
    ///
    /// With a shared drive ID the listing is scoped to that drive.
    pub fn children_of(folder_id: &str, drive_id: Option<&str>) -> Self {
        let mut params = Self {
            q: Some(format!("'{}' in parents and trashed = false", folder_id)),
            page_size: Some(1000),
            supports_all_drives: Some(true),
            include_items_from_all_drives: Some(true),
            fields: Some("files(id,name,mimeType,parents,driveId)".to_string()),
            ..Default::default()
        };
        if let Some(drive_id) = drive_id {
            params.corpora = Some("drive".to_string());
            params.drive_id = Some(drive_id.to_string());
        }
        params
    }
}

/// Parameters for getting a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFileParams {
    /// Fields to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,

    /// Support all drives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_all_drives: Option<bool>,
}

/// Request to create a folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    /// Folder name.
    pub name: String,

    /// Always the folder MIME type.
    pub mime_type: String,

    /// Parent folder IDs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,

    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateFolderRequest {
    /// Creates a request for a folder named `name` under `parent`.
    pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            parents: vec![parent.into()],
            description: None,
        }
    }
}

/// Metadata changes of a file update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether trashed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trashed: Option<bool>,

    /// Whether starred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
}

/// Query parameters of a file update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileParams {
    /// Comma separated parent IDs to add.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_parents: Option<String>,

    /// Comma separated parent IDs to remove.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_parents: Option<String>,

    /// Support all drives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_all_drives: Option<bool>,

    /// Fields to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_fields_adds_cursor() {
        assert_eq!(list_fields(None), None);
        assert_eq!(
            list_fields(Some("users(primaryEmail)".to_string())).as_deref(),
            Some("nextPageToken,users(primaryEmail)")
        );
        assert_eq!(
            list_fields(Some("nextPageToken,files(id)".to_string())).as_deref(),
            Some("nextPageToken,files(id)")
        );
    }

    #[test]
    fn test_user_keeps_unknown_fields() {
        let json = r#"{"id":"1","primaryEmail":"a@example.com","isAdmin":true,"name":{"fullName":"A"}}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.primary_email, "a@example.com");
        assert_eq!(user.extra.get("isAdmin"), Some(&Value::Bool(true)));

        let round: Value = serde_json::to_value(&user).unwrap();
        assert_eq!(round["name"]["fullName"], "A");
    }

    #[test]
    fn test_member_type() {
        let member: Member =
            serde_json::from_str(r#"{"email":"g@example.com","type":"GROUP"}"#).unwrap();
        assert!(!member.is_user());
        let member: Member =
            serde_json::from_str(r#"{"email":"u@example.com","type":"USER"}"#).unwrap();
        assert!(member.is_user());
    }

    #[test]
    fn test_list_params_query_string() {
        let params = ListUsersParams {
            customer: Some("my_customer".to_string()),
            ..ListUsersParams::in_org_unit("/Sales")
        };
        let query = serde_urlencoded::to_string(&params).unwrap();
        assert!(query.contains("customer=my_customer"));
        assert!(query.contains("query=orgUnitPath%3D%27%2FSales%27"));
        assert!(query.contains("maxResults=500"));
    }

    #[test]
    fn test_children_of_shared_drive() {
        let params = ListFilesParams::children_of("abc", Some("drive1"));
        assert_eq!(params.q.as_deref(), Some("'abc' in parents and trashed = false"));
        assert_eq!(params.corpora.as_deref(), Some("drive"));
        assert_eq!(params.drive_id.as_deref(), Some("drive1"));

        let params = ListFilesParams::children_of("abc", None);
        assert!(params.corpora.is_none());
    }

    #[test]
    fn test_folder_request() {
        let request = CreateFolderRequest::new("Reports", "parent1");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mimeType"], FOLDER_MIME_TYPE);
        assert_eq!(json["parents"][0], "parent1");
    }
}
