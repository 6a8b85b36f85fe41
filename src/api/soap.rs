//! Envelopes and response parsing for the classic `_vti_bin` web services

use super::backend::RawRow;
use super::constants::soap::{
    ERROR_CODE_ITEM_MISSING, ERROR_CODE_SUCCESS, NAMESPACE, ROW_ATTRIBUTE_PREFIX, SYSTEM_COLUMNS,
};
use super::error::{ListError, ListResult};
use quick_xml::escape::escape;
use roxmltree::{Document, Node};
use serde_json::{Map, Value};

/// `Cmd` attribute of a batch `Method`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchCommand {
    New,
    Update,
    Delete,
}

impl BatchCommand {
    fn as_str(&self) -> &'static str {
        match self {
            BatchCommand::New => "New",
            BatchCommand::Update => "Update",
            BatchCommand::Delete => "Delete",
        }
    }
}

/// Wrap an operation element in a SOAP 1.1 envelope
pub fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>{}</soap:Body>
</soap:Envelope>"#,
        body
    )
}

pub fn get_web(site_url: &str) -> String {
    envelope(&format!(
        r#"<GetWeb xmlns="{}"><webUrl>{}</webUrl></GetWeb>"#,
        NAMESPACE,
        escape(site_url)
    ))
}

pub fn get_list_items(list_name: &str, row_limit: usize) -> String {
    envelope(&format!(
        r#"<GetListItems xmlns="{ns}">
      <listName>{list}</listName>
      <viewFields><ViewFields /></viewFields>
      <rowLimit>{limit}</rowLimit>
      <queryOptions><QueryOptions><IncludeMandatoryColumns>FALSE</IncludeMandatoryColumns></QueryOptions></queryOptions>
    </GetListItems>"#,
        ns = NAMESPACE,
        list = escape(list_name),
        limit = row_limit.max(1),
    ))
}

/// One-method batch; `id` is `None` only for `New`
pub fn update_list_items(
    list_name: &str,
    command: BatchCommand,
    id: Option<i64>,
    data: &Map<String, Value>,
) -> String {
    let id_value = id.map_or_else(|| "New".to_string(), |id| id.to_string());
    let mut fields = format!(r#"<Field Name="ID">{}</Field>"#, id_value);
    for (name, value) in data {
        if name.eq_ignore_ascii_case("ID") {
            continue;
        }
        fields.push_str(&format!(
            r#"<Field Name="{}">{}</Field>"#,
            escape(name.as_str()),
            escape(field_value(value).as_str())
        ));
    }

    envelope(&format!(
        r#"<UpdateListItems xmlns="{ns}">
      <listName>{list}</listName>
      <updates><Batch OnError="Continue"><Method ID="1" Cmd="{cmd}">{fields}</Method></Batch></updates>
    </UpdateListItems>"#,
        ns = NAMESPACE,
        list = escape(list_name),
        cmd = command.as_str(),
        fields = fields,
    ))
}

/// Text form SharePoint expects for a field value in a batch
pub fn field_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rows of a `GetListItems` response, keyed by column name without the `ows_` prefix
pub fn parse_rows(body: &str) -> ListResult<Vec<RawRow>> {
    let doc = Document::parse(body)?;
    if !doc.descendants().any(|n| n.has_tag_name("listitems")) {
        return Err(ListError::Protocol("GetListItems response has no listitems".to_string()));
    }
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("row"))
        .map(row_from_node)
        .collect())
}

/// Outcome of the single batch method; the returned row is present for `New` and `Update`
pub fn parse_update_result(body: &str, id: Option<i64>) -> ListResult<Option<RawRow>> {
    let doc = Document::parse(body)?;
    let result = doc
        .descendants()
        .find(|n| n.has_tag_name("Result"))
        .ok_or_else(|| ListError::Protocol("UpdateListItems response has no Result".to_string()))?;

    let code = child_text(result, "ErrorCode").unwrap_or(ERROR_CODE_SUCCESS);
    if !code.eq_ignore_ascii_case(ERROR_CODE_SUCCESS) {
        if let Some(id) = id.filter(|_| code.eq_ignore_ascii_case(ERROR_CODE_ITEM_MISSING)) {
            return Err(ListError::NotFound { id });
        }
        let text = child_text(result, "ErrorText").unwrap_or("batch method failed");
        return Err(ListError::Rejected {
            status: 200,
            message: format!("{} ({})", text, code),
        });
    }

    Ok(result
        .descendants()
        .find(|n| n.has_tag_name("row"))
        .map(row_from_node))
}

/// `Title` attribute of the `Web` element in a `GetWeb` response
pub fn parse_web_title(body: &str) -> ListResult<Option<String>> {
    let doc = Document::parse(body)?;
    Ok(doc
        .descendants()
        .find(|n| n.has_tag_name("Web"))
        .and_then(|n| n.attribute("Title"))
        .map(str::to_string))
}

/// Message of a SOAP fault, preferring SharePoint's `errorstring` detail
pub fn parse_fault(body: &str) -> Option<String> {
    let doc = Document::parse(body).ok()?;
    let fault = doc.descendants().find(|n| n.has_tag_name("Fault"))?;
    let text_of = |name: &str| {
        fault
            .descendants()
            .find(|n| n.has_tag_name(name))
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    };
    Some(
        text_of("errorstring")
            .or_else(|| text_of("faultstring"))
            .unwrap_or_else(|| "SOAP fault".to_string()),
    )
}

fn row_from_node(node: Node) -> RawRow {
    node.attributes()
        .filter_map(|attr| {
            let name = attr.name().strip_prefix(ROW_ATTRIBUTE_PREFIX)?;
            if SYSTEM_COLUMNS.contains(&name) {
                return None;
            }
            Some((name.to_string(), Value::String(attr.value().to_string())))
        })
        .collect()
}

fn child_text<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(str::trim)
}
