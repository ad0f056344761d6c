// ABOUTME: Web API client for friendscan
// ABOUTME: HTTP transport, typed endpoint gateway, raw response dumps and the QR login handshake

pub mod dump;
pub mod error;
pub mod gateway;
pub mod login;
pub mod transport;
pub mod wire;

pub use dump::ResponseDump;
pub use error::{ClientError, Result};
pub use gateway::{ContactList, GroupSnapshot, WebApi};
pub use login::{LoginCredentials, LoginPoll, QrLogin};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, Transport};
pub use wire::{decode_envelope, ApiOutcome};
