#![deny(unreachable_pub)]

//! Wire messages exchanged with the remote API endpoint.
//!
//! Every message is carried as JSON; raw byte payloads are base64 encoded.
//! The envelope wraps any service call, while the datastore and
//! remote-datastore modules describe the payloads the client needs to
//! understand in order to emulate transactions.

pub mod codec;
pub mod datastore;
pub mod envelope;
pub mod remote_datastore;
pub mod urlfetch;

pub use codec::CodecError;
pub use codec::decode;
pub use codec::encode;
pub use envelope::ApplicationError;
pub use envelope::Request;
pub use envelope::Response;
