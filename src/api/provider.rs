use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Requests a provider must be able to serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Listed expiration dates for a ticker
    Expirations,
    /// Calls and puts for one expiration, selected with a `date` query parameter
    Chain,
    /// Latest underlying price
    LatestPrice,
}

/// A market-data provider described as data.
///
/// Endpoint paths are templates relative to `base_url`; `{ticker}` is
/// replaced with the requested symbol.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: &'static str,
    pub icon: &'static str,
    pub base_url: &'static str,
    pub endpoints: HashMap<Endpoint, &'static str>,
}

impl ProviderDescriptor {
    pub fn by_name(name: &str) -> Option<&'static ProviderDescriptor> {
        PROVIDERS.get(name.trim().to_ascii_lowercase().as_str())
    }

    pub fn all() -> impl Iterator<Item = &'static ProviderDescriptor> {
        PROVIDERS.values()
    }

    /// Endpoint path with `{ticker}` substituted
    pub fn path(&self, endpoint: Endpoint, ticker: &str) -> Option<String> {
        self.endpoints
            .get(&endpoint)
            .map(|template| template.replace("{ticker}", ticker))
    }
}

fn yahoo(name: &'static str, host: &'static str) -> ProviderDescriptor {
    ProviderDescriptor {
        name,
        icon: "📈",
        base_url: host,
        endpoints: HashMap::from([
            (Endpoint::Expirations, "/v7/finance/options/{ticker}"),
            (Endpoint::Chain, "/v7/finance/options/{ticker}"),
            (Endpoint::LatestPrice, "/v8/finance/chart/{ticker}"),
        ]),
    }
}

static PROVIDERS: Lazy<HashMap<&'static str, ProviderDescriptor>> = Lazy::new(|| {
    [
        yahoo("yahoo", "https://query2.finance.yahoo.com"),
        yahoo("yahoo-query1", "https://query1.finance.yahoo.com"),
    ]
    .into_iter()
    .map(|p| (p.name, p))
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let yahoo = ProviderDescriptor::by_name(" Yahoo ").unwrap();
        assert_eq!(yahoo.name, "yahoo");
        assert!(ProviderDescriptor::by_name("bloomberg").is_none());
        assert_eq!(ProviderDescriptor::all().count(), 2);
    }

    #[test]
    fn paths_substitute_the_ticker() {
        let yahoo = ProviderDescriptor::by_name("yahoo").unwrap();
        assert_eq!(
            yahoo.path(Endpoint::Chain, "MA").as_deref(),
            Some("/v7/finance/options/MA")
        );
        assert_eq!(
            yahoo.path(Endpoint::LatestPrice, "MA").as_deref(),
            Some("/v8/finance/chart/MA")
        );
    }
}
