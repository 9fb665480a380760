use ipnetwork::IpNetwork;
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;

/// Values referenced by rules through a data id, each with an expiration
/// in unix seconds (0 never expires).
#[derive(Debug, Clone, Default)]
pub(crate) struct DataSet {
    values: HashMap<String, u64>,
    networks: Vec<(IpNetwork, u64)>,
}

impl DataSet {
    /// Parse one `rules_data` entry into its id and values.
    pub fn parse(entry: &Value) -> Result<(String, DataSet), String> {
        let obj = entry.as_object().ok_or("rule data entry is not an object")?;
        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .ok_or("missing key 'id'")?;
        let data_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or("missing key 'type'")?;
        if data_type != "ip_with_expiration" && data_type != "data_with_expiration" {
            return Err(format!("unsupported data type: {}", data_type));
        }
        let data = obj
            .get("data")
            .and_then(Value::as_array)
            .ok_or("missing key 'data'")?;

        let mut set = DataSet::default();
        for item in data {
            let Some(value) = item.get("value").and_then(Value::as_str) else {
                continue;
            };
            let expiration = item.get("expiration").map(parse_expiration).unwrap_or(0);
            set.insert(value, expiration);
        }

        Ok((id.to_string(), set))
    }

    fn insert(&mut self, value: &str, expiration: u64) {
        if let Ok(network) = value.parse::<IpNetwork>() {
            self.networks.push((network, expiration));
        }
        // Keep the latest expiration for duplicated values
        let slot = self.values.entry(value.to_string()).or_insert(expiration);
        if expiration == 0 || (*slot != 0 && expiration > *slot) {
            *slot = expiration;
        }
    }

    /// Exact membership of a value that has not expired at `now`.
    pub fn contains_value(&self, value: &str, now: u64) -> bool {
        self.values
            .get(value)
            .is_some_and(|exp| is_live(*exp, now))
    }

    /// Membership of an address in any live network.
    pub fn contains_ip(&self, ip: IpAddr, now: u64) -> bool {
        self.networks
            .iter()
            .any(|(net, exp)| is_live(*exp, now) && net.contains(ip))
    }
}

#[inline]
fn is_live(expiration: u64, now: u64) -> bool {
    expiration == 0 || expiration > now
}

fn parse_expiration(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// All data sets of one engine instance, keyed by data id.
#[derive(Debug, Clone, Default)]
pub(crate) struct DataStore {
    sets: HashMap<String, DataSet>,
}

impl DataStore {
    pub fn get(&self, id: &str) -> Option<&DataSet> {
        self.sets.get(id)
    }

    /// Copy of this store with the given sets replacing those of the same id.
    pub fn merged(&self, updates: impl IntoIterator<Item = (String, DataSet)>) -> Self {
        let mut sets = self.sets.clone();
        sets.extend(updates);
        DataStore { sets }
    }
}
