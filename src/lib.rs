//! Read and edit SharePoint lists through one client, whether the site runs on-premises
//! (classic SOAP web services) or in SharePoint Online (REST).

pub mod api;
pub mod cli;
pub mod config;
pub mod export;
pub mod list;
