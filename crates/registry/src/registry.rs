use crate::error::RegistryError;
use contentpack_common::Category;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

/// Highest assignable id. Archive indexes store the record count as a u16,
/// so id 65535 would need 65536 records.
pub const MAX_ID: u16 = u16::MAX - 1;

/// Bidirectional `id <-> debugname` mapping for one category.
///
/// Ids are dense small integers; `next_id` is the allocation watermark and
/// never decreases. Saved files list `id=name` lines in ascending id order so
/// they diff cleanly.
#[derive(Debug, Clone)]
pub struct NameRegistry {
    category: Category,
    names: Vec<Option<String>>,
    ids: HashMap<String, u16>,
    next_id: u32,
}

impl NameRegistry {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            names: Vec::new(),
            ids: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Allocation watermark: one past the highest id ever handed out.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Bind `id` to `name`. Fails if either side is already taken.
    pub fn register(&mut self, id: u16, name: &str) -> Result<(), RegistryError> {
        if id > MAX_ID {
            return Err(RegistryError::Exhausted {
                category: self.category,
            });
        }
        if let Some(existing) = self.ids.get(name) {
            return Err(self.duplicate(id, name, format!("name already bound to {existing}")));
        }
        if let Some(existing) = self.name(id) {
            return Err(self.duplicate(id, name, format!("id already bound to '{existing}'")));
        }
        let index = id as usize;
        if self.names.len() <= index {
            self.names.resize(index + 1, None);
        }
        self.names[index] = Some(name.to_string());
        self.ids.insert(name.to_string(), id);
        self.next_id = self.next_id.max(id as u32 + 1);
        Ok(())
    }

    pub fn id(&self, name: &str) -> Option<u16> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: u16) -> Option<&str> {
        self.names.get(id as usize).and_then(|n| n.as_deref())
    }

    /// Hand out the next unused id and advance the watermark.
    pub fn allocate(&mut self) -> Result<u16, RegistryError> {
        let id = u16::try_from(self.next_id)
            .ok()
            .filter(|&id| id <= MAX_ID)
            .ok_or(RegistryError::Exhausted {
                category: self.category,
            })?;
        self.next_id += 1;
        Ok(id)
    }

    /// Return the id bound to `name`, allocating and binding a new one if absent.
    pub fn get_or_allocate(&mut self, name: &str) -> Result<u16, RegistryError> {
        if let Some(id) = self.id(name) {
            return Ok(id);
        }
        let id = self.allocate()?;
        self.register(id, name)?;
        tracing::debug!(category = %self.category, id, name, "allocated id");
        Ok(id)
    }

    /// Name bound to `id`, binding `<category>_<id>` first if the id is unnamed.
    pub fn placeholder(&mut self, id: u16) -> Result<String, RegistryError> {
        if let Some(name) = self.name(id) {
            return Ok(name.to_string());
        }
        let name = self.category.placeholder(id);
        self.register(id, &name)?;
        Ok(name)
    }

    /// Rebind an already-registered id to a new, unused name.
    pub fn rename(&mut self, id: u16, new_name: &str) -> Result<(), RegistryError> {
        if let Some(existing) = self.ids.get(new_name) {
            if *existing == id {
                return Ok(());
            }
            return Err(self.duplicate(id, new_name, format!("name already bound to {existing}")));
        }
        if self.name(id).is_none() {
            return Err(self.duplicate(id, new_name, "id is not bound".to_string()));
        }
        self.names[id as usize] = Some(new_name.to_string());
        self.refresh_names();
        Ok(())
    }

    /// Rebuild the name index from the id table.
    pub fn refresh_names(&mut self) {
        self.ids = self
            .names
            .iter()
            .enumerate()
            .filter_map(|(id, name)| name.as_ref().map(|n| (n.clone(), id as u16)))
            .collect();
    }

    /// Bound `(id, name)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(id, name)| name.as_deref().map(|n| (id as u16, n)))
    }

    /// Parse the flat `id=name` text format.
    pub fn parse(category: Category, path: &Path, text: &str) -> Result<Self, RegistryError> {
        let mut registry = Self::new(category);
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let raw = raw.trim_end_matches('\r');
            if raw.trim().is_empty() {
                continue;
            }
            let parse_error = |message: String| RegistryError::Parse {
                path: path.to_path_buf(),
                line,
                message,
            };
            let (id, name) = raw
                .split_once('=')
                .ok_or_else(|| parse_error(format!("expected id=name, found '{raw}'")))?;
            let id: u16 = id
                .trim()
                .parse()
                .map_err(|_| parse_error(format!("invalid id '{id}'")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(parse_error(format!("empty name for id {id}")));
            }
            registry
                .register(id, name)
                .map_err(|e| parse_error(e.to_string()))?;
        }
        Ok(registry)
    }

    /// Render the registry as ascending `id=name` lines.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (id, name) in self.iter() {
            let _ = writeln!(out, "{id}={name}");
        }
        out
    }

    /// Load a registry file. A missing file yields an empty registry.
    pub fn load(category: Category, path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(category, path, &text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new(category)),
            Err(source) => Err(RegistryError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let io = |source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(path, self.to_text()).map_err(io)
    }

    fn duplicate(&self, id: u16, name: &str, conflict: String) -> RegistryError {
        RegistryError::DuplicateBinding {
            category: self.category,
            id,
            name: name.to_string(),
            conflict,
        }
    }
}
