pub mod auth;
pub mod credentials;
pub mod error;
pub mod firestore;
pub mod storage;
pub mod value;

pub use auth::TokenSource;
pub use credentials::{AuthorizedUser, Credentials, ServiceAccountKey};
pub use error::{FirebaseError, Result};
pub use firestore::Firestore;
pub use storage::{Storage, UploadedObject};
pub use value::{field_paths, Document, Fields, Value};
