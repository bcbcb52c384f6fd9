//! Transport callbacks consumed, not implemented, by the Raft layer
//! itself (spec §4.9): `connect(address) -> stream` and
//! `bind(address) -> listener`. `raftlite` only needs the portable
//! `host:port` subset of the address grammar; abstract Unix addresses
//! parse but have no connector here (see [`Address::Unix`]).

use std::future::Future;

use raftlite_error::{RaftliteError, Result};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};

/// A parsed peer address (spec §4.9's address grammar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `host:port`, the subset every host can dial.
    Tcp(String),
    /// `@name`, an abstract Unix domain socket name. Recognized so the
    /// parser round-trips cluster configs that name one, but connecting
    /// to it is not implemented here (see module docs).
    Unix(String),
}

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(name) = raw.strip_prefix('@') {
            return Ok(Self::Unix(name.to_owned()));
        }
        if raw.rsplit_once(':').is_some() {
            return Ok(Self::Tcp(raw.to_owned()));
        }
        Err(RaftliteError::protocol(format!("not a host:port or @name address: {raw}")))
    }
}

/// Dials a peer named by a spec §4.9 address.
pub trait Connect {
    fn connect(&self, address: &str) -> impl Future<Output = Result<TcpStream>> + Send;
}

/// Accepts inbound connections on a bound address.
pub trait Listener: Sized {
    fn bind(address: &str) -> impl Future<Output = Result<Self>> + Send;
    fn accept(&self) -> impl Future<Output = Result<(TcpStream, std::net::SocketAddr)>> + Send;
}

/// The default `Connect`/`Listener` pair: plain TCP, for `host:port`
/// addresses. Unix abstract addresses are rejected here with `Protocol`
/// rather than silently falling back to TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

impl Connect for TcpTransport {
    async fn connect(&self, address: &str) -> Result<TcpStream> {
        match Address::parse(address)? {
            Address::Tcp(host_port) => TcpStream::connect(host_port.as_str())
                .await
                .map_err(|e| RaftliteError::IoRead { detail: e.to_string() }),
            Address::Unix(name) => Err(RaftliteError::protocol(format!(
                "abstract Unix address '@{name}' has no connector in this transport"
            ))),
        }
    }
}

/// Wraps a bound `tokio::net::TcpListener`.
pub struct TcpBoundListener {
    inner: TokioTcpListener,
}

impl Listener for TcpBoundListener {
    async fn bind(address: &str) -> Result<Self> {
        match Address::parse(address)? {
            Address::Tcp(host_port) => TokioTcpListener::bind(host_port.as_str())
                .await
                .map(|inner| Self { inner })
                .map_err(|e| RaftliteError::IoRead { detail: e.to_string() }),
            Address::Unix(name) => {
                Err(RaftliteError::protocol(format!("cannot bind abstract Unix address '@{name}'")))
            }
        }
    }

    async fn accept(&self) -> Result<(TcpStream, std::net::SocketAddr)> {
        self.inner.accept().await.map_err(|e| RaftliteError::IoRead { detail: e.to_string() })
    }
}
