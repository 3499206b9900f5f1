//! Profile photo service: Firebase sign-in, camera capture, Storage upload
//! and a Firestore profile update, driven by a small local HTTP API.

pub mod api;
pub mod firebase;
pub mod profile;

#[cfg(test)]
pub(crate) mod testing;
