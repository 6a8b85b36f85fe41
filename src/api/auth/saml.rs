//! SharePoint Online user-credential exchange
//!
//! The security token service issues a compact SAML token for the site; posting that
//! token to the site's sign-in form yields the `FedAuth`/`rtFa` cookies used by REST calls.

use super::Credentials;
use crate::api::error::{ListError, ListResult};
use quick_xml::escape::escape;
use roxmltree::Document;

/// Build the WS-Trust issue request for `site_url`
pub fn token_request(credentials: &Credentials, sts_url: &str, site_url: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://www.w3.org/2005/08/addressing" xmlns:u="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
  <s:Header>
    <a:Action s:mustUnderstand="1">http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue</a:Action>
    <a:ReplyTo><a:Address>http://www.w3.org/2005/08/addressing/anonymous</a:Address></a:ReplyTo>
    <a:To s:mustUnderstand="1">{sts}</a:To>
    <o:Security s:mustUnderstand="1" xmlns:o="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">
      <o:UsernameToken>
        <o:Username>{username}</o:Username>
        <o:Password>{password}</o:Password>
      </o:UsernameToken>
    </o:Security>
  </s:Header>
  <s:Body>
    <t:RequestSecurityToken xmlns:t="http://schemas.xmlsoap.org/ws/2005/02/trust">
      <wsp:AppliesTo xmlns:wsp="http://schemas.xmlsoap.org/ws/2004/09/policy">
        <a:EndpointReference><a:Address>{site}</a:Address></a:EndpointReference>
      </wsp:AppliesTo>
      <t:KeyType>http://schemas.xmlsoap.org/ws/2005/05/identity/NoProofKey</t:KeyType>
      <t:RequestType>http://schemas.xmlsoap.org/ws/2005/02/trust/Issue</t:RequestType>
      <t:TokenType>urn:oasis:names:tc:SAML:1.0:assertion</t:TokenType>
    </t:RequestSecurityToken>
  </s:Body>
</s:Envelope>"#,
        sts = escape(sts_url),
        username = escape(credentials.username.as_str()),
        password = escape(credentials.password.as_str()),
        site = escape(site_url),
    )
}

/// Extract the binary security token, or the STS fault text as an authentication error
pub fn parse_token_response(body: &str) -> ListResult<String> {
    let doc = Document::parse(body)?;

    if let Some(token) = doc
        .descendants()
        .find(|n| n.has_tag_name("BinarySecurityToken"))
        .and_then(|n| n.text())
    {
        return Ok(token.trim().to_string());
    }

    let fault = doc
        .descendants()
        .find(|n| n.has_tag_name("Fault"))
        .map(|fault| {
            fault
                .descendants()
                .filter(|n| n.has_tag_name("text") || n.has_tag_name("Text"))
                .filter_map(|n| n.text())
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(": ")
        });

    match fault {
        Some(message) if !message.is_empty() => Err(ListError::Authentication(message)),
        Some(_) => Err(ListError::Authentication("security token service returned a fault".to_string())),
        None => Err(ListError::Protocol("no security token in STS response".to_string())),
    }
}
