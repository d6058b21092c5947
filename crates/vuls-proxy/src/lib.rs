//! vuls-proxy - Remote dictionary backend
//!
//! Implements `DictionaryClient` by forwarding lookups over HTTP to a
//! go-cve-dictionary style server via `DictClient`.

mod proxy;

pub use proxy::RemoteDictionary;
