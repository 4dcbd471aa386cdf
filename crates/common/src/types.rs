use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One kind of content definition, or an asset namespace referenced by them.
///
/// Config categories have a text schema and a binary wire format. Asset
/// namespaces (models, animation frames, textures) only have a name registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Flo,
    Idk,
    Seq,
    SpotAnim,
    Varp,
    Loc,
    Npc,
    Obj,
    Model,
    Anim,
    Texture,
}

impl Category {
    /// Every category that is compiled from text sources, in declaration order.
    pub const CONFIGS: [Category; 8] = [
        Category::Flo,
        Category::Idk,
        Category::Seq,
        Category::SpotAnim,
        Category::Varp,
        Category::Loc,
        Category::Npc,
        Category::Obj,
    ];

    /// Asset namespaces whose registries are synced from files on disk.
    pub const ASSETS: [Category; 3] = [Category::Model, Category::Anim, Category::Texture];

    pub const ALL: [Category; 11] = [
        Category::Flo,
        Category::Idk,
        Category::Seq,
        Category::SpotAnim,
        Category::Varp,
        Category::Loc,
        Category::Npc,
        Category::Obj,
        Category::Model,
        Category::Anim,
        Category::Texture,
    ];

    /// Lowercase name used for registry files, archives, and placeholders.
    pub fn name(self) -> &'static str {
        match self {
            Category::Flo => "flo",
            Category::Idk => "idk",
            Category::Seq => "seq",
            Category::SpotAnim => "spotanim",
            Category::Varp => "varp",
            Category::Loc => "loc",
            Category::Npc => "npc",
            Category::Obj => "obj",
            Category::Model => "model",
            Category::Anim => "anim",
            Category::Texture => "texture",
        }
    }

    /// File extension of the sources (or asset files) for this category.
    pub fn extension(self) -> &'static str {
        match self {
            Category::Model => "ob2",
            Category::Anim => "frame",
            Category::Texture => "png",
            other => other.name(),
        }
    }

    pub fn is_config(self) -> bool {
        Self::CONFIGS.contains(&self)
    }

    /// Placeholder debugname synthesized for an id that has no name.
    pub fn placeholder(self, id: u16) -> String {
        format!("{}_{id}", self.name())
    }

    /// The id a placeholder name stands for: `model_12` is model 12.
    ///
    /// Only the exact form [`placeholder`](Self::placeholder) produces
    /// matches, so `model_012` and `model_x` do not.
    pub fn placeholder_id(self, name: &str) -> Option<u16> {
        let digits = name.strip_prefix(self.name())?.strip_prefix('_')?;
        let id: u16 = digits.parse().ok()?;
        (id.to_string() == digits).then_some(id)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string does not name a category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.name().parse::<Category>().unwrap(), category);
        }
        assert!("interface".parse::<Category>().is_err());
    }

    #[test]
    fn asset_namespaces_are_not_configs() {
        for category in Category::ASSETS {
            assert!(!category.is_config());
        }
        assert_eq!(Category::Model.extension(), "ob2");
        assert_eq!(Category::Npc.extension(), "npc");
    }

    #[test]
    fn placeholder_names() {
        assert_eq!(Category::Obj.placeholder(12), "obj_12");
        assert_eq!(Category::Model.placeholder(0), "model_0");
    }

    #[test]
    fn placeholder_ids_parse_back() {
        assert_eq!(Category::Model.placeholder_id("model_10"), Some(10));
        assert_eq!(Category::Model.placeholder_id("model_0"), Some(0));
        assert_eq!(Category::Model.placeholder_id("model_010"), None);
        assert_eq!(Category::Model.placeholder_id("model_+1"), None);
        assert_eq!(Category::Model.placeholder_id("model_rock"), None);
        assert_eq!(Category::Model.placeholder_id("obj_3"), None);
        assert_eq!(Category::Model.placeholder_id("model_70000"), None);
    }
}
