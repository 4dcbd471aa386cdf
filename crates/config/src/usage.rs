use crate::value::Value;
use contentpack_common::Category;
use contentpack_registry::Registries;
use std::collections::BTreeMap;

/// One property that points at a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUser {
    pub category: Category,
    pub debugname: String,
    pub key: String,
}

/// Which records reference each model id, in the order they were seen.
#[derive(Debug, Clone, Default)]
pub struct ModelUsage {
    users: BTreeMap<u16, Vec<ModelUser>>,
}

impl ModelUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: u16, category: Category, debugname: &str, key: &str) {
        let users = self.users.entry(model).or_default();
        let user = ModelUser {
            category,
            debugname: debugname.to_string(),
            key: key.to_string(),
        };
        if !users.contains(&user) {
            users.push(user);
        }
    }

    /// Record every model referenced by one record's properties.
    ///
    /// Names missing from the model registry are skipped.
    pub fn record_properties<'a>(
        &mut self,
        category: Category,
        debugname: &str,
        properties: impl IntoIterator<Item = (&'a str, &'a Value)>,
        registries: &Registries,
    ) {
        let models = registries.get(Category::Model);
        for (key, value) in properties {
            if let Some(id) = value.model().and_then(|name| models.id(name)) {
                self.record(id, category, debugname, key);
            }
        }
    }

    pub fn users(&self, model: u16) -> &[ModelUser] {
        self.users.get(&model).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &[ModelUser])> + '_ {
        self.users.iter().map(|(id, users)| (*id, users.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_model_properties_once() {
        let mut regs = Registries::empty("unused");
        regs.get_mut(Category::Model).register(4, "rock").unwrap();
        let rock = Value::reference(Category::Model, "rock");
        let wear = Value::Wear {
            model: "rock".into(),
            offset: 2,
        };
        let name = Value::Text("Rock".into());

        let mut usage = ModelUsage::new();
        let props = [("model", &rock), ("name", &name), ("manwear", &wear), ("model", &rock)];
        usage.record_properties(Category::Obj, "rock_item", props, &regs);

        let users = usage.users(4);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].key, "model");
        assert_eq!(users[1].key, "manwear");
        assert!(usage.users(5).is_empty());
    }
}
