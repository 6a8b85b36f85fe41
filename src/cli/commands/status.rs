use crate::list::ListClient;
use anyhow::Result;
use colored::*;
use log::{error, info};

pub async fn status_command(client: &mut ListClient) -> Result<()> {
    let info = client.describe();

    println!("SharePoint List Status");
    println!("======================");
    println!("  Site: {}", info.site_url);
    println!("  List: {}", info.list_name);
    println!("  Backend: {}", info.mode);

    println!("\nTesting authentication...");
    match client.try_authenticate().await {
        Ok(()) => {
            info!("Authentication test successful");
            println!("{} Authentication successful", "✓".bright_green().bold());
            Ok(())
        }
        Err(e) => {
            error!("Authentication test failed: {}", e);
            println!("{} Authentication failed: {}", "✗".bright_red().bold(), e);
            Err(e.into())
        }
    }
}
