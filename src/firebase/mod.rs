//! Firebase REST implementations of the identity, storage and document seams

pub mod firestore;
pub mod google;
pub mod identity;
pub mod storage;
pub mod transport;

pub use firestore::FirestoreDocuments;
pub use google::GoogleSignIn;
pub use identity::FirebaseIdentity;
pub use storage::FirebaseStorage;
pub use transport::{RestClient, TransportError};
