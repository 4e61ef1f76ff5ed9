use std::future::Future;
use std::net::SocketAddr;

use crate::error::{Error, Result};

pub const DEFAULT_SERVICE: &str = "6600";

/// Ordered list of addresses to try for the configured host and service.
///
/// The list is looked up lazily: [`Resolver::candidate`] resolves when there
/// is nothing left to try, so exhausting every address (or calling
/// [`Resolver::reset`] after a successful connection) makes the next attempt
/// start from a fresh lookup.
#[derive(Debug)]
pub struct Resolver {
    host: String,
    service: String,
    candidates: Vec<SocketAddr>,
    cursor: usize,
}

impl Resolver {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            candidates: Vec::new(),
            cursor: 0,
        }
    }

    pub async fn resolve(&mut self) -> Result<()> {
        let addrs = self.lookup().await?;
        self.install(addrs);
        Ok(())
    }

    /// The lookup on its own, detached from `self` so the caller can poll it
    /// alongside other work.
    pub fn lookup(&self) -> impl Future<Output = Result<Vec<SocketAddr>>> + Send + 'static {
        let host = self.host.clone();
        let service = self.service.clone();

        async move {
            let error = |reason: String| Error::Resolution {
                host: host.clone(),
                service: service.clone(),
                reason,
            };
            let port = parse_service(&service).ok_or_else(|| error("unknown service".into()))?;

            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), port))
                .await
                .map_err(|e| error(e.to_string()))?
                .collect();
            if addrs.is_empty() {
                return Err(error("no results".into()));
            }
            Ok(addrs)
        }
    }

    /// Replace the candidate list with a fresh lookup result.
    pub fn install(&mut self, addrs: Vec<SocketAddr>) {
        log::debug!(
            "Resolved node \"{}\" service \"{}\" to {:?}",
            self.host,
            self.service,
            addrs
        );
        self.candidates = addrs;
        self.cursor = 0;
    }

    /// The address to try next, resolving first if the list is used up.
    pub async fn candidate(&mut self) -> Result<SocketAddr> {
        if self.current().is_none() {
            self.resolve().await?;
        }
        self.current().ok_or_else(|| self.error("no results"))
    }

    pub fn current(&self) -> Option<SocketAddr> {
        self.candidates.get(self.cursor).copied()
    }

    /// Move past the current address; `None` once the list is exhausted.
    pub fn advance(&mut self) -> Option<SocketAddr> {
        if self.cursor < self.candidates.len() {
            self.cursor += 1;
        }
        self.current()
    }

    pub fn reset(&mut self) {
        self.candidates.clear();
        self.cursor = 0;
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::Resolution {
            host: self.host.clone(),
            service: self.service.clone(),
            reason: reason.into(),
        }
    }
}

fn parse_service(service: &str) -> Option<u16> {
    match service {
        "mpd" => Some(6600),
        _ => service.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn numeric_host_resolves_to_single_candidate() {
        let mut resolver = Resolver::new("127.0.0.1", "6600");
        let addr = resolver.candidate().await.unwrap();
        assert_eq!(addr, "127.0.0.1:6600".parse::<SocketAddr>().unwrap());
        assert_eq!(resolver.advance(), None);
        assert_eq!(resolver.current(), None);
    }

    #[tokio::test]
    async fn exhausted_list_is_resolved_again() {
        let mut resolver = Resolver::new("::1", "mpd");
        let first = resolver.candidate().await.unwrap();
        assert_eq!(first.port(), 6600);
        assert!(resolver.advance().is_none());

        let again = resolver.candidate().await.unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn unknown_service_is_a_resolution_error() {
        let mut resolver = Resolver::new("127.0.0.1", "not-a-port");
        let err = resolver.candidate().await.unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert_eq!(
            err.to_string(),
            "Unable to resolve node \"127.0.0.1\" service \"not-a-port\" (unknown service)"
        );
    }

    #[tokio::test]
    async fn detached_lookup_installs_later() {
        let mut resolver = Resolver::new("127.0.0.1", "6601");
        let lookup = resolver.lookup();
        assert_eq!(resolver.current(), None);

        resolver.install(lookup.await.unwrap());
        assert_eq!(resolver.current().map(|a| a.port()), Some(6601));
    }

    #[test]
    fn advance_stops_at_end() {
        let mut resolver = Resolver::new("localhost", "6600");
        assert_eq!(resolver.advance(), None);
        assert_eq!(resolver.advance(), None);
    }
}
