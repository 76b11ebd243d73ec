use std::error::Error;

use super::{credential_store, SessionArgs};
use crate::core::builtin_providers;
use crate::core::config::Config;
use crate::core::credentials::resolve_api_key;

pub fn list_providers(args: &SessionArgs) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let store = credential_store(args, &config)?;
    let default_provider = config.default_provider.as_deref();

    println!("Providers:");
    println!();
    let rows: Vec<[String; 4]> = builtin_providers::all()
        .iter()
        .map(|provider| {
            let key_status = match resolve_api_key(store.as_ref(), provider) {
                Ok(Some(_)) => "yes",
                Ok(None) => "not needed",
                Err(_) => "no",
            };
            let id = if default_provider.is_some_and(|d| d.eq_ignore_ascii_case(&provider.id)) {
                format!("{}*", provider.id)
            } else {
                provider.id.clone()
            };
            [id, provider.display_name.clone(), provider.base_url.clone(), key_status.to_string()]
        })
        .collect();

    let header = ["Provider", "Name", "URL", "Key"];
    let widths: Vec<usize> = (0..header.len())
        .map(|col| {
            rows.iter()
                .map(|row| row[col].len())
                .chain(std::iter::once(header[col].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render = |cells: [&str; 4]| {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {}", line.trim_end());
    };
    render(header);
    for row in &rows {
        render([&row[0], &row[1], &row[2], &row[3]]);
    }

    if default_provider.is_some() {
        println!();
        println!("  * = default provider");
    }
    Ok(())
}
