//! Credentials and authentication schemes for both SharePoint protocols

pub mod ntlm;
pub mod saml;

use std::fmt;

/// Username/password pair configured for a site
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Split `DOMAIN\user` into its parts; other forms have an empty domain
    pub fn domain_and_user(&self) -> (&str, &str) {
        match self.username.split_once('\\') {
            Some((domain, user)) => (domain, user),
            None => ("", self.username.as_str()),
        }
    }
}

/// Authentication schemes tried against an on-premises site, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassicAuthScheme {
    /// NTLM challenge/response negotiated over the connection
    Ntlm,
    /// Plain HTTP basic credentials
    Basic,
}

impl ClassicAuthScheme {
    pub const ORDER: [ClassicAuthScheme; 2] = [ClassicAuthScheme::Ntlm, ClassicAuthScheme::Basic];
}

impl fmt::Display for ClassicAuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassicAuthScheme::Ntlm => write!(f, "NTLM"),
            ClassicAuthScheme::Basic => write!(f, "basic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_split() {
        let creds = Credentials::new("CORP\\jdoe", "pw");
        assert_eq!(creds.domain_and_user(), ("CORP", "jdoe"));

        let creds = Credentials::new("jdoe@corp.example", "pw");
        assert_eq!(creds.domain_and_user(), ("", "jdoe@corp.example"));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("jdoe", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("jdoe"));
        assert!(!debug.contains("hunter2"));
    }
}
