//! Endpoint templating
//!
//! Turns the configured write URL plus host / db / credential / TLS overrides
//! into the single URL string the submitter posts to.

use contracts::{ContractError, EndpointConfig, TEMPLATE_ENDPOINT};
use tracing::debug;
use url::Url;

/// Resolve the final write endpoint
///
/// An empty URL falls back to the local template. Overrides are applied in
/// order: scheme, host, `db` query parameter, credentials.
///
/// # Errors
/// [`ContractError::ConfigParse`] when the URL or the host override cannot be
/// parsed.
pub fn resolve_endpoint(config: &EndpointConfig) -> Result<String, ContractError> {
    let raw = if config.url.trim().is_empty() {
        TEMPLATE_ENDPOINT
    } else {
        config.url.as_str()
    };

    let mut url = Url::parse(raw).map_err(|e| {
        ContractError::config_parse_with(format!("cannot parse endpoint URL '{raw}'"), e)
    })?;

    if config.ssl {
        url.set_scheme("https")
            .map_err(|_| ContractError::config_parse("cannot switch endpoint scheme to https"))?;
    }

    if let Some(host) = non_empty(&config.host) {
        apply_host(&mut url, host)?;
    }

    if let Some(dbname) = non_empty(&config.dbname) {
        apply_dbname(&mut url, dbname);
    }

    if let Some(user) = non_empty(&config.user) {
        url.set_username(user)
            .map_err(|_| ContractError::config_parse("endpoint URL cannot carry a username"))?;
        url.set_password(non_empty(&config.password))
            .map_err(|_| ContractError::config_parse("endpoint URL cannot carry a password"))?;
    }

    debug!(
        scheme = url.scheme(),
        host = url.host_str().unwrap_or_default(),
        path = url.path(),
        "Endpoint resolved"
    );

    Ok(url.to_string())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Replace host and port; a host without a port drops the explicit port
fn apply_host(url: &mut Url, host: &str) -> Result<(), ContractError> {
    let probe = Url::parse(&format!("{}://{}", url.scheme(), host)).map_err(|e| {
        ContractError::config_parse_with(format!("cannot parse endpoint host '{host}'"), e)
    })?;

    url.set_host(probe.host_str()).map_err(|e| {
        ContractError::config_parse_with(format!("invalid endpoint host '{host}'"), e)
    })?;
    url.set_port(probe.port())
        .map_err(|_| ContractError::config_parse(format!("invalid endpoint port in '{host}'")))?;
    Ok(())
}

/// Set `db=<dbname>`, keeping every other query parameter
fn apply_dbname(url: &mut Url, dbname: &str) {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "db")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.push(("db".to_string(), dbname.to_string()));
    pairs.sort();

    url.query_pairs_mut().clear().extend_pairs(pairs);
}
