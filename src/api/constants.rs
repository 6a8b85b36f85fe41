//! Endpoint paths, SOAP actions and headers for both SharePoint protocols

/// Tenant domain that marks a site as SharePoint Online
pub const DEFAULT_CLOUD_DOMAIN: &str = "sharepoint.com";

/// Microsoft security token service used for SharePoint Online user credentials
pub const DEFAULT_STS_URL: &str = "https://login.microsoftonline.com/extSTS.srf";

pub const USER_AGENT: &str = "sharepoint-cli/1.0";

/// Classic (on-premises) SOAP web services
pub mod soap {
    pub const LISTS_SERVICE: &str = "_vti_bin/Lists.asmx";
    pub const WEBS_SERVICE: &str = "_vti_bin/Webs.asmx";

    pub const NAMESPACE: &str = "http://schemas.microsoft.com/sharepoint/soap/";
    pub const ACTION_GET_LIST_ITEMS: &str = "http://schemas.microsoft.com/sharepoint/soap/GetListItems";
    pub const ACTION_UPDATE_LIST_ITEMS: &str =
        "http://schemas.microsoft.com/sharepoint/soap/UpdateListItems";
    pub const ACTION_GET_WEB: &str = "http://schemas.microsoft.com/sharepoint/soap/GetWeb";

    pub const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

    /// Prefix SharePoint puts on every column attribute of a `z:row`
    pub const ROW_ATTRIBUTE_PREFIX: &str = "ows_";

    pub const ERROR_CODE_SUCCESS: &str = "0x00000000";
    /// "Item does not exist. It may have been deleted by another user."
    pub const ERROR_CODE_ITEM_MISSING: &str = "0x81020016";

    /// Bookkeeping columns returned by `GetListItems` that are not list data
    pub const SYSTEM_COLUMNS: &[&str] = &[
        "_ModerationStatus",
        "_Level",
        "_IsCurrentVersion",
        "_UIVersionString",
        "Created_x0020_Date",
        "Last_x0020_Modified",
        "FileRef",
        "FileLeafRef",
        "FileDirRef",
        "FSObjType",
        "FolderChildCount",
        "ItemChildCount",
        "MetaInfo",
        "PermMask",
        "owshiddenversion",
        "UniqueId",
        "GUID",
        "ContentTypeId",
        "ServerUrl",
        "EncodedAbsUrl",
        "BaseName",
        "WorkflowVersion",
        "SortBehavior",
        "ProgId",
        "ScopeId",
    ];
}

/// SharePoint Online REST API
pub mod rest {
    pub const CONTEXT_INFO: &str = "_api/contextinfo";
    pub const SIGN_IN: &str = "/_forms/default.aspx?wa=wsignin1.0";

    pub const ACCEPT_JSON: &str = "application/json;odata=nometadata";
    pub const CONTENT_TYPE_JSON: &str = "application/json;odata=nometadata";
    pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
    pub const CONTENT_TYPE_SOAP12: &str = "application/soap+xml; charset=utf-8";

    pub const HEADER_DIGEST: &str = "X-RequestDigest";
    pub const HEADER_HTTP_METHOD: &str = "X-HTTP-Method";
    pub const HEADER_IF_MATCH: &str = "IF-MATCH";
    pub const IF_MATCH_ANY: &str = "*";

    /// Display text of every column, including user and lookup titles
    pub const FIELD_VALUES_AS_TEXT: &str = "FieldValuesAsText";
    /// Suffix of the key holding a reference column's raw ID when the column is not expanded
    pub const REFERENCE_ID_SUFFIX: &str = "Id";
}

/// Join a site URL and a service path with exactly one slash between them
pub fn site_endpoint(site_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        site_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// `_api/web/lists/GetByTitle('<list>')` with the title quoted for OData
pub fn list_endpoint(site_url: &str, list_name: &str) -> String {
    let quoted = list_name.replace('\'', "''");
    site_endpoint(
        site_url,
        &format!("_api/web/lists/GetByTitle('{}')", urlencoding::encode(&quoted)),
    )
}

pub fn list_items_endpoint(site_url: &str, list_name: &str) -> String {
    format!("{}/items", list_endpoint(site_url, list_name))
}

pub fn list_item_endpoint(site_url: &str, list_name: &str, id: i64) -> String {
    format!("{}/items({})", list_endpoint(site_url, list_name), id)
}

pub fn list_fields_endpoint(site_url: &str, list_name: &str) -> String {
    format!("{}/fields", list_endpoint(site_url, list_name))
}

pub fn list_get_items_endpoint(site_url: &str, list_name: &str) -> String {
    format!("{}/GetItems", list_endpoint(site_url, list_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_endpoint_slashes() {
        assert_eq!(
            site_endpoint("https://intranet/sites/hr/", "/_vti_bin/Lists.asmx"),
            "https://intranet/sites/hr/_vti_bin/Lists.asmx"
        );
        assert_eq!(
            site_endpoint("https://intranet/sites/hr", soap::LISTS_SERVICE),
            "https://intranet/sites/hr/_vti_bin/Lists.asmx"
        );
    }

    #[test]
    fn test_list_endpoint_quotes_title() {
        assert_eq!(
            list_item_endpoint("https://contoso.sharepoint.com/sites/a", "Bob's List", 7),
            "https://contoso.sharepoint.com/sites/a/_api/web/lists/GetByTitle('Bob%27%27s%20List')/items(7)"
        );
    }
}
