// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kerberos realm configuration for the GSS mechanism.
//!
//! The client either synthesizes a krb5 configuration from the domain and KDC
//! hosts, or accepts pre-built configuration text. Both paths end up in the same
//! [`Krb5Config`] model, which the GSS mechanism receives verbatim.
//!
//! Synthesized configuration follows a fixed template:
//!
//! ```text
//! [libdefaults]
//! default_realm = EXAMPLE.COM
//! udp_preference_limit = 1
//! forwardable = true
//! [realms]
//! EXAMPLE.COM = {
//! kdc = dc1.example.com
//! default_domain = example.com
//! }
//! [domain_realm]
//! .example.com=EXAMPLE.COM
//! example.com=EXAMPLE.COM
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::dns_errors::{Result, WinDnsError};

/// Settings for a single realm stanza.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealmStanza {
    /// KDC hosts, in preference order
    pub kdcs: Vec<String>,
    /// Default DNS domain for the realm
    pub default_domain: Option<String>,
    /// Any other `key = value` pairs, kept for the mechanism
    pub extra: BTreeMap<String, String>,
}

/// Parsed krb5 configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Krb5Config {
    libdefaults: BTreeMap<String, String>,
    realms: BTreeMap<String, RealmStanza>,
    domain_realm: BTreeMap<String, String>,
}

impl Krb5Config {
    /// Build the configuration for `domain` with one `kdc` line per host.
    ///
    /// UDP is effectively disabled (`udp_preference_limit = 1`) so the mechanism
    /// talks to the KDC over TCP, which AD KDCs expect for large tickets.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `domain` is empty or `kdcs` is empty.
    pub fn from_domain<S: AsRef<str>>(domain: &str, kdcs: &[S]) -> Result<Self> {
        if domain.trim().is_empty() {
            return Err(WinDnsError::configuration("no domain specified"));
        }
        if kdcs.is_empty() {
            return Err(WinDnsError::configuration("no kdcs specified"));
        }

        let lower = domain.to_lowercase();
        let upper = domain.to_uppercase();

        let mut libdefaults = BTreeMap::new();
        libdefaults.insert("default_realm".to_string(), upper.clone());
        libdefaults.insert("udp_preference_limit".to_string(), "1".to_string());
        libdefaults.insert("forwardable".to_string(), "true".to_string());

        let stanza = RealmStanza {
            kdcs: kdcs.iter().map(|k| k.as_ref().to_string()).collect(),
            default_domain: Some(lower.clone()),
            extra: BTreeMap::new(),
        };
        let mut realms = BTreeMap::new();
        realms.insert(upper.clone(), stanza);

        let mut domain_realm = BTreeMap::new();
        domain_realm.insert(format!(".{lower}"), upper.clone());
        domain_realm.insert(lower, upper);

        Ok(Self {
            libdefaults,
            realms,
            domain_realm,
        })
    }

    /// Read and parse a krb5 configuration file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WinDnsError::configuration(format!(
                "failed to read krb5 config {}: {e}",
                path.display()
            ))
        })?;
        text.parse()
    }

    /// The realm used when a principal carries none.
    #[must_use]
    pub fn default_realm(&self) -> Option<&str> {
        self.libdefaults.get("default_realm").map(String::as_str)
    }

    /// Look up a `[libdefaults]` setting.
    #[must_use]
    pub fn libdefault(&self, key: &str) -> Option<&str> {
        self.libdefaults.get(key).map(String::as_str)
    }

    /// The stanza for `realm`, matched case-insensitively.
    #[must_use]
    pub fn realm(&self, realm: &str) -> Option<&RealmStanza> {
        self.realms
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(realm))
            .map(|(_, stanza)| stanza)
    }

    /// KDC hosts configured for `realm`, empty if the realm is unknown.
    #[must_use]
    pub fn kdcs(&self, realm: &str) -> &[String] {
        self.realm(realm).map_or(&[], |s| s.kdcs.as_slice())
    }

    /// Realm mapped to a DNS domain in `[domain_realm]`.
    #[must_use]
    pub fn realm_for_domain(&self, domain: &str) -> Option<&str> {
        let domain = domain.trim_end_matches('.').to_lowercase();
        self.domain_realm
            .get(&domain)
            .or_else(|| {
                // walk up the tree looking for a ".suffix" mapping
                let mut rest = domain.as_str();
                loop {
                    if let Some(found) = self.domain_realm.get(&format!(".{rest}")) {
                        return Some(found);
                    }
                    let (_, parent) = rest.split_once('.')?;
                    rest = parent;
                }
            })
            .map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        let realm = self
            .default_realm()
            .ok_or_else(|| WinDnsError::configuration("krb5 config has no default_realm"))?;
        if self.kdcs(realm).is_empty() {
            return Err(WinDnsError::configuration(format!(
                "krb5 config has no kdc for default realm {realm}"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    LibDefaults,
    Realms,
    DomainRealm,
    Other,
}

impl FromStr for Krb5Config {
    type Err = WinDnsError;

    fn from_str(text: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut section = Section::None;
        let mut open_realm: Option<(String, RealmStanza)> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let lineno = idx + 1;
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some((name, mut stanza)) = open_realm.take() {
                if line == "}" {
                    config.realms.insert(name, stanza);
                    continue;
                }
                let (key, value) = split_assignment(line, lineno)?;
                match key.as_str() {
                    "kdc" => stanza.kdcs.push(value),
                    "default_domain" => stanza.default_domain = Some(value),
                    _ => {
                        stanza.extra.insert(key, value);
                    }
                }
                open_realm = Some((name, stanza));
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = match &line[1..line.len() - 1] {
                    "libdefaults" => Section::LibDefaults,
                    "realms" => Section::Realms,
                    "domain_realm" => Section::DomainRealm,
                    _ => Section::Other,
                };
                continue;
            }

            match section {
                Section::None => {
                    return Err(WinDnsError::configuration(format!(
                        "krb5 config line {lineno}: setting outside of any section"
                    )));
                }
                Section::LibDefaults => {
                    let (key, value) = split_assignment(line, lineno)?;
                    config.libdefaults.insert(key, value);
                }
                Section::Realms => {
                    let (name, value) = split_assignment(line, lineno)?;
                    if value != "{" {
                        return Err(WinDnsError::configuration(format!(
                            "krb5 config line {lineno}: expected '{{' after realm {name}"
                        )));
                    }
                    open_realm = Some((name, RealmStanza::default()));
                }
                Section::DomainRealm => {
                    let (domain, realm) = split_assignment(line, lineno)?;
                    config.domain_realm.insert(domain.to_lowercase(), realm);
                }
                Section::Other => {}
            }
        }

        if let Some((name, _)) = open_realm {
            return Err(WinDnsError::configuration(format!(
                "krb5 config realm {name} is missing a closing '}}'"
            )));
        }

        config.validate()?;
        Ok(config)
    }
}

fn split_assignment(line: &str, lineno: usize) -> Result<(String, String)> {
    let (key, value) = line.split_once('=').ok_or_else(|| {
        WinDnsError::configuration(format!("krb5 config line {lineno}: expected key = value"))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(WinDnsError::configuration(format!(
            "krb5 config line {lineno}: empty key"
        )));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

impl fmt::Display for Krb5Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[libdefaults]")?;
        // default_realm first, matching the layout tools expect
        if let Some(realm) = self.default_realm() {
            writeln!(f, "default_realm = {realm}")?;
        }
        for (key, value) in self.libdefaults.iter().filter(|(k, _)| *k != "default_realm") {
            writeln!(f, "{key} = {value}")?;
        }

        writeln!(f, "[realms]")?;
        for (name, stanza) in &self.realms {
            writeln!(f, "{name} = {{")?;
            for kdc in &stanza.kdcs {
                writeln!(f, "kdc = {kdc}")?;
            }
            if let Some(domain) = &stanza.default_domain {
                writeln!(f, "default_domain = {domain}")?;
            }
            for (key, value) in &stanza.extra {
                writeln!(f, "{key} = {value}")?;
            }
            writeln!(f, "}}")?;
        }

        writeln!(f, "[domain_realm]")?;
        for (domain, realm) in &self.domain_realm {
            writeln!(f, "{domain}={realm}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "krb5_tests.rs"]
mod krb5_tests;
