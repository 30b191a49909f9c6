pub mod client;
pub mod payload;
pub mod response;

pub use client::{build_http_client, parse_remote_charge, PixClient};
pub use response::{RemoteCharge, RemotePix, RemoteProblem, RemoteRefund};
