//! Request operations and the access level each one requires.

// self
use crate::{_prelude::*, auth::AccessLevel};

/// A business action named by a route, fixed at compile time. Every protected route declares
/// exactly one [`Operation`]; the authorization mediator never infers it from the HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
	/// `GET /containers/{id}/items` — list a container's items.
	ListContainers,
	/// `GET /drives/{id}/items/{itemId}/content` — stream a file's content.
	PreviewFile,
	/// `DELETE /drives/{id}/items/{itemId}` — delete a file.
	DeleteFile,
	/// `GET /documents/{id}` — read a document's business metadata.
	ReadMetadata,
	/// `PATCH /documents/{id}` — update a document's business metadata.
	UpdateMetadata,
	/// `PUT /containers/{id}/files/{*path}`, `POST /upload/session`, `PUT
	/// /upload/session/{id}/chunk` — upload or append to a file.
	UploadFile,
	/// Replace an existing file's content in place.
	UpdateFile,
	/// Create a new container.
	CreateContainer,
	/// Delete a container.
	DeleteContainer,
	/// Share a file with another principal.
	ShareFile,
	/// Grant, revoke, or inspect permissions on a resource.
	ManagePermissions,
	/// Administrative container operations (quota, retention, lifecycle).
	ManageContainers,
}
impl Operation {
	/// The minimum [`AccessLevel`] a snapshot must meet for this operation to proceed,
	/// absent an explicit deny or an admin override. Mirrors the operation → required-level
	/// table verbatim.
	pub const fn required_access_level(self) -> AccessLevel {
		match self {
			Operation::PreviewFile | Operation::ListContainers | Operation::ReadMetadata => AccessLevel::Read,
			Operation::UploadFile
			| Operation::UpdateFile
			| Operation::UpdateMetadata
			| Operation::CreateContainer => AccessLevel::Write,
			Operation::DeleteFile | Operation::DeleteContainer => AccessLevel::Delete,
			Operation::ShareFile | Operation::ManagePermissions => AccessLevel::Share,
			Operation::ManageContainers => AccessLevel::Admin,
		}
	}

	/// Returns the stable snake_case label used in routes, audit records, and metric/span
	/// fields (e.g. `"preview_file"`).
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::ListContainers => "list_containers",
			Operation::PreviewFile => "preview_file",
			Operation::DeleteFile => "delete_file",
			Operation::ReadMetadata => "read_metadata",
			Operation::UpdateMetadata => "update_metadata",
			Operation::UploadFile => "upload_file",
			Operation::UpdateFile => "update_file",
			Operation::CreateContainer => "create_container",
			Operation::DeleteContainer => "delete_container",
			Operation::ShareFile => "share_file",
			Operation::ManagePermissions => "manage_permissions",
			Operation::ManageContainers => "manage_containers",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
