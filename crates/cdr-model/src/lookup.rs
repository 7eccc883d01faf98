use std::collections::HashMap;

/// Map keyed by ASCII-case-insensitive names.
///
/// When two keys collide after folding, the first one inserted wins.
#[derive(Debug, Clone)]
pub struct CaseInsensitiveMap<V> {
    map: HashMap<String, V>,
}

impl<V> CaseInsensitiveMap<V> {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
    {
        let mut map = HashMap::new();
        for (name, value) in entries {
            let key = name.as_ref().trim().to_ascii_uppercase();
            map.entry(key).or_insert(value);
        }
        Self { map }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.map.get(&name.trim().to_ascii_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(&name.trim().to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_insert_wins() {
        let map = CaseInsensitiveMap::new([("Vitals", 1), ("VITALS", 2)]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("vitals"), Some(&1));
        assert!(map.contains(" Vitals "));
    }
}
