use crate::field::Field;
use crate::tables;
use crate::value::Value;
use contentpack_common::Category;
use contentpack_source::{CoerceError, Schema};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Opcode that terminates every record.
pub const END: u8 = 0;

/// Server-only opcode carrying the record's debugname.
pub const DEBUGNAME: u8 = 250;

/// Which encodings carry an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Both,
    Client,
    Server,
}

/// One of the two encodings produced per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Client,
    Server,
}

impl Scope {
    pub fn includes(self, target: Target) -> bool {
        matches!(
            (self, target),
            (Scope::Both, _) | (Scope::Client, Target::Client) | (Scope::Server, Target::Server)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub code: u8,
    pub field: Field,
    pub scope: Scope,
    /// Emitted before all other properties, in table order.
    pub leading: bool,
}

impl Op {
    pub const fn new(code: u8, field: Field) -> Self {
        Self {
            code,
            field,
            scope: Scope::Both,
            leading: false,
        }
    }

    pub const fn client(mut self) -> Self {
        self.scope = Scope::Client;
        self
    }

    pub const fn server(mut self) -> Self {
        self.scope = Scope::Server;
        self
    }

    pub const fn leading(mut self) -> Self {
        self.leading = true;
        self
    }
}

/// The complete wire format of one config category.
#[derive(Debug)]
pub struct Format {
    pub category: Category,
    ops: Vec<Op>,
    required: &'static [&'static str],
}

static FORMATS: LazyLock<Vec<Format>> = LazyLock::new(|| {
    Category::CONFIGS
        .into_iter()
        .filter_map(|category| {
            let (ops, required) = tables::ops(category)?;
            Some(Format {
                category,
                ops,
                required,
            })
        })
        .collect()
});

impl Format {
    /// The format of a config category; `None` for asset namespaces.
    pub fn of(category: Category) -> Option<&'static Format> {
        FORMATS.iter().find(|f| f.category == category)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn op(&self, code: u8) -> Option<&Op> {
        self.ops.iter().find(|op| op.code == code)
    }

    /// Index of the op that encodes `key` with this typed value.
    pub fn op_for(&self, key: &str, value: &Value) -> Option<usize> {
        self.ops
            .iter()
            .position(|op| op.field.claims(key) && op.field.accepts(value))
    }

    /// Categories whose ids this format writes.
    pub fn references(&self) -> BTreeSet<Category> {
        self.ops
            .iter()
            .flat_map(|op| match op.field {
                Field::Ref(_, category, _) | Field::RefList(_, category) => vec![category],
                Field::LocModels | Field::Wear(_) => vec![Category::Model],
                Field::Held(_) | Field::Count(_) => vec![Category::Obj],
                Field::WalkAnims(_) => vec![Category::Seq],
                Field::Frames => vec![Category::Anim],
                Field::Recolours | Field::RecolourHalf(..) => vec![Category::Texture],
                _ => Vec::new(),
            })
            .collect()
    }
}

impl Schema for Format {
    type Value = Value;

    fn coerce(&self, key: &str, value: &str) -> Result<Value, CoerceError> {
        let mut last = CoerceError::UnknownKey;
        for op in self.ops.iter().filter(|op| op.field.claims(key)) {
            match op.field.coerce(key, value) {
                Ok(value) => return Ok(value),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    fn required(&self) -> &[&'static str] {
        self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_config_category_has_a_format() {
        for category in Category::CONFIGS {
            assert!(Format::of(category).is_some(), "{category}");
        }
        assert!(Format::of(Category::Model).is_none());
    }

    #[test]
    fn opcodes_are_unique_and_reserved_codes_unused() {
        for category in Category::CONFIGS {
            let format = Format::of(category).unwrap();
            let mut seen = HashSet::new();
            for op in format.ops() {
                assert!(seen.insert(op.code), "{category} reuses opcode {}", op.code);
                assert_ne!(op.code, END);
                assert_ne!(op.code, DEBUGNAME);
            }
        }
    }

    #[test]
    fn walkanim_dispatch_by_value_shape() {
        let npc = Format::of(Category::Npc).unwrap();
        let single = npc.coerce("walkanim", "walk").unwrap();
        let compound = npc.coerce("walkanim", "walk,back,left,right").unwrap();
        assert_eq!(npc.ops()[npc.op_for("walkanim", &single).unwrap()].code, 14);
        assert_eq!(npc.ops()[npc.op_for("walkanim", &compound).unwrap()].code, 17);
    }

    #[test]
    fn unknown_key_versus_invalid_value() {
        let obj = Format::of(Category::Obj).unwrap();
        assert_eq!(obj.coerce("wibble", "1"), Err(CoerceError::UnknownKey));
        assert!(matches!(obj.coerce("cost", "lots"), Err(CoerceError::Invalid(_))));
    }

    #[test]
    fn references_drive_build_order() {
        let loc = Format::of(Category::Loc).unwrap().references();
        assert!(loc.contains(&Category::Model));
        assert!(loc.contains(&Category::Seq));
        assert!(!loc.contains(&Category::Npc));
        let varp = Format::of(Category::Varp).unwrap().references();
        assert!(varp.is_empty());
    }

    #[test]
    fn scopes() {
        assert!(Scope::Both.includes(Target::Server));
        assert!(!Scope::Client.includes(Target::Server));
        assert!(Scope::Server.includes(Target::Server));
    }
}
