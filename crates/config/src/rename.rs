//! Renaming placeholder-named models after the records that use them.

use crate::error::PackError;
use crate::usage::ModelUsage;
use contentpack_common::Category;
use contentpack_registry::NameRegistry;
use contentpack_source::collect_files;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Model file extension.
pub const MODEL_EXTENSION: &str = "ob2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub model: u16,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenamePlan {
    pub renames: Vec<Rename>,
}

impl RenamePlan {
    /// Plan a descriptive name for every model still named `model_<id>`.
    ///
    /// The first recorded owner names the model as
    /// `<category>_<debugname>_<key>`. Targets already bound in the
    /// registry or claimed earlier in the plan are skipped.
    pub fn from_usage(usage: &ModelUsage, models: &NameRegistry) -> Self {
        let mut taken = HashSet::new();
        let mut renames = Vec::new();
        for (model, users) in usage.iter() {
            let Some(owner) = users.first() else {
                continue;
            };
            let placeholder = Category::Model.placeholder(model);
            if models.name(model) != Some(placeholder.as_str()) {
                continue;
            }
            let to = format!("{}_{}_{}", owner.category, owner.debugname, owner.key);
            if models.id(&to).is_some() || !taken.insert(to.clone()) {
                tracing::debug!(model, %to, "rename target taken");
                continue;
            }
            renames.push(Rename {
                model,
                from: placeholder,
                to,
            });
        }
        Self { renames }
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Move model files and rebind registry names.
    ///
    /// Files already at their target are left alone, so applying a plan
    /// twice changes nothing the second time. Returns the number of
    /// files moved.
    pub fn apply(&self, models_dir: &Path, registry: &mut NameRegistry) -> Result<usize, PackError> {
        let files: BTreeMap<String, _> = if models_dir.is_dir() {
            collect_files(models_dir, MODEL_EXTENSION)?
                .into_iter()
                .filter_map(|path| {
                    let stem = path.file_stem()?.to_str()?.to_string();
                    Some((stem, path))
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        let mut moved = 0;
        for rename in &self.renames {
            if let Some(path) = files.get(&rename.from) {
                let target = path.with_file_name(format!("{}.{MODEL_EXTENSION}", rename.to));
                if !target.exists() {
                    std::fs::rename(path, &target).map_err(PackError::io(path))?;
                    tracing::info!(model = rename.model, from = %rename.from, to = %rename.to, "renamed model");
                    moved += 1;
                }
            }
            if registry.name(rename.model) == Some(rename.from.as_str()) {
                registry.rename(rename.model, &rename.to)?;
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ModelUsage, NameRegistry) {
        let mut models = NameRegistry::new(Category::Model);
        models.register(0, "model_0").unwrap();
        models.register(1, "model_1").unwrap();
        models.register(2, "chair").unwrap();
        models.register(3, "model_3").unwrap();
        let mut usage = ModelUsage::new();
        usage.record(0, Category::Obj, "sword", "model");
        usage.record(0, Category::Npc, "guard", "model1");
        usage.record(2, Category::Loc, "chair", "model");
        usage.record(3, Category::Obj, "sword", "model");
        (usage, models)
    }

    #[test]
    fn plan_names_after_first_owner() {
        let (usage, models) = setup();
        let plan = RenamePlan::from_usage(&usage, &models);
        assert_eq!(
            plan.renames,
            vec![Rename {
                model: 0,
                from: "model_0".into(),
                to: "obj_sword_model".into(),
            }]
        );
    }

    #[test]
    fn apply_moves_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("items");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("model_0.ob2"), [1, 2, 3]).unwrap();

        let (usage, mut models) = setup();
        let plan = RenamePlan::from_usage(&usage, &models);
        assert_eq!(plan.apply(dir.path(), &mut models).unwrap(), 1);
        assert!(nested.join("obj_sword_model.ob2").exists());
        assert!(!nested.join("model_0.ob2").exists());
        assert_eq!(models.id("obj_sword_model"), Some(0));

        assert_eq!(plan.apply(dir.path(), &mut models).unwrap(), 0);
        assert!(RenamePlan::from_usage(&usage, &models).is_empty());
    }

    #[test]
    fn missing_directory_only_rebinds() {
        let dir = tempfile::tempdir().unwrap();
        let (usage, mut models) = setup();
        let plan = RenamePlan::from_usage(&usage, &models);
        assert_eq!(plan.apply(&dir.path().join("absent"), &mut models).unwrap(), 0);
        assert_eq!(models.name(0), Some("obj_sword_model"));
    }
}
