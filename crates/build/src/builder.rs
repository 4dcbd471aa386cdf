use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::manifest::{IntegrityManifest, manifest_key};
use crate::scheduler::should_build;
use crate::stages::{Stage, plan};
use contentpack_common::Category;
use contentpack_config::{
    Archive, ChecksumGate, ChecksumOutcome, Format, ModelUsage, PackedCategory, RenamePlan,
    Unpacker, Value, pack, typed_records,
};
use contentpack_model::ModelStore;
use contentpack_registry::{MAX_ID, Registries};
use contentpack_source::{ConfigRecord, ConstantTable, SourceParser, collect_files};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Extension of constant definition files.
const CONSTANT_EXTENSION: &str = "constant";

/// Result of packing one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackReport {
    pub category: Category,
    pub records: usize,
    pub crc32: u32,
    pub checksum: ChecksumOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub packed: Vec<PackReport>,
    /// Categories whose outputs were up to date.
    pub skipped: Vec<Category>,
}

#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    /// Directory holding `client/` and `server/` archives. Defaults to the
    /// reference cache.
    pub input: Option<PathBuf>,
    /// Review against the packed output archives.
    pub compare: bool,
    /// Rename placeholder-named model files after the records using them.
    pub rename_models: bool,
    /// Text output path. Defaults to `<unpack>/<category>.<ext>`.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackReport {
    pub category: Category,
    pub output: PathBuf,
    pub records: usize,
    pub reviews: usize,
    pub appended: usize,
    pub renamed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateReport {
    pub category: Category,
    pub records: usize,
    pub checksum: ChecksumOutcome,
}

/// One build, unpack, or validate invocation over a project layout.
///
/// Registries are loaded once when the builder is created and saved per
/// category as each stage finishes.
pub struct Builder {
    config: BuildConfig,
    registries: Registries,
    gate: ChecksumGate,
    constants: Option<ConstantTable>,
    records: BTreeMap<Category, Vec<ConfigRecord<Value>>>,
    usage: ModelUsage,
    implementation: Option<PathBuf>,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Result<Self, BuildError> {
        let registries = Registries::load(&config.layout.pack)?;
        let gate = config
            .checksums
            .iter()
            .fold(ChecksumGate::new(config.strict), |gate, (category, crc)| {
                gate.with_expected(*category, *crc)
            });
        Ok(Self {
            config,
            registries,
            gate,
            constants: None,
            records: BTreeMap::new(),
            usage: ModelUsage::new(),
            implementation: std::env::current_exe().ok(),
        })
    }

    /// File whose modification makes every output stale. Defaults to the
    /// running executable.
    pub fn with_implementation(mut self, implementation: Option<PathBuf>) -> Self {
        self.implementation = implementation;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Models referenced by everything packed or unpacked so far.
    pub fn usage(&self) -> &ModelUsage {
        &self.usage
    }

    /// Pack one category and the registers it depends on.
    pub fn pack(&mut self, category: Category) -> Result<PackReport, BuildError> {
        let stages = plan(&[category])?;
        let mut reports = self.run(&stages)?;
        reports.pop().ok_or(BuildError::NotConfig(category))
    }

    /// Pack every config category whose output is stale.
    pub fn pack_all(&mut self) -> Result<BuildSummary, BuildError> {
        let mut stale = Vec::new();
        let mut skipped = Vec::new();
        for category in Category::CONFIGS {
            let output = Archive::dat_path(&self.config.layout.client, category);
            let rebuild = self.config.force
                || should_build(
                    &self.config.layout.scripts,
                    category.extension(),
                    &output,
                    self.implementation.as_deref(),
                )?;
            if rebuild {
                stale.push(category);
            } else {
                tracing::info!(%category, "up to date");
                skipped.push(category);
            }
        }
        if stale.is_empty() {
            return Ok(BuildSummary {
                packed: Vec::new(),
                skipped,
            });
        }
        let stages = plan(&stale)?;
        let packed = self.run(&stages)?;
        Ok(BuildSummary { packed, skipped })
    }

    fn run(&mut self, stages: &[Stage]) -> Result<Vec<PackReport>, BuildError> {
        let mut reports = Vec::new();
        for &stage in stages {
            let _span = tracing::info_span!("stage", %stage).entered();
            match stage {
                Stage::Register(category) if category.is_config() => self.register_sources(category)?,
                Stage::Register(category) => self.sync_assets(category)?,
                Stage::Pack(category) => reports.push(self.pack_category(category)?),
            }
        }
        Ok(reports)
    }

    fn constants(&mut self) -> Result<&ConstantTable, BuildError> {
        if self.constants.is_none() {
            let scripts = &self.config.layout.scripts;
            let files = if scripts.is_dir() {
                collect_files(scripts, CONSTANT_EXTENSION)?
            } else {
                Vec::new()
            };
            self.constants = Some(ConstantTable::load(&files)?);
        }
        Ok(self.constants.get_or_insert_with(ConstantTable::new))
    }

    /// Bind names of asset files that the registry does not know yet.
    fn sync_assets(&mut self, category: Category) -> Result<(), BuildError> {
        let Some(dir) = self.config.layout.asset_dir(category) else {
            return Ok(());
        };
        if !dir.is_dir() {
            tracing::debug!(%category, dir = %dir.display(), "no asset directory");
            return Ok(());
        }
        let files = collect_files(dir, category.extension())?;
        let stems: Vec<&str> = files
            .iter()
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()))
            .collect();
        let registry = self.registries.get_mut(category);
        let mut added = 0;
        // `model_12.ob2` is model 12; bind those before allocating new ids
        for stem in &stems {
            let Some(id) = category.placeholder_id(stem) else {
                continue;
            };
            if id <= MAX_ID && registry.id(stem).is_none() && registry.name(id).is_none() {
                registry.register(id, stem)?;
                added += 1;
            }
        }
        for stem in stems {
            if registry.id(stem).is_none() {
                registry.get_or_allocate(stem)?;
                added += 1;
            }
        }
        if added > 0 {
            tracing::info!(%category, added, "registered new assets");
        }
        self.registries.save(category)?;
        Ok(())
    }

    /// Parse a category's sources and bind every debugname.
    fn register_sources(&mut self, category: Category) -> Result<(), BuildError> {
        let format = Format::of(category).ok_or(BuildError::NotConfig(category))?;
        let files = collect_files(&self.config.layout.scripts, category.extension())?;
        let raw = {
            let constants = self.constants()?;
            let mut parser = SourceParser::new(constants);
            parser.parse_files(&files)?;
            parser.finish()
        };
        let records = typed_records(format, &raw)?;
        let registry = self.registries.get_mut(category);
        for record in &records {
            registry.get_or_allocate(&record.debugname)?;
        }
        tracing::debug!(%category, files = files.len(), records = records.len(), "registered");
        self.registries.save(category)?;
        self.records.insert(category, records);
        Ok(())
    }

    fn pack_category(&mut self, category: Category) -> Result<PackReport, BuildError> {
        let format = Format::of(category).ok_or(BuildError::NotConfig(category))?;
        let records = self.records.remove(&category).unwrap_or_default();
        let packed = pack(format, &records, &mut self.registries, &mut self.usage)?;
        let crc32 = packed.client.crc32();
        let checksum = self.gate.check(category, crc32)?;

        let layout = &self.config.layout;
        packed.client.save(&layout.client, category)?;
        packed.server.save(&layout.server, category)?;
        self.registries.save(category)?;
        self.record_manifest(category, &packed)?;

        tracing::info!(%category, records = records.len(), crc = format_args!("{crc32:#010x}"), "packed");
        Ok(PackReport {
            category,
            records: packed.client.len(),
            crc32,
            checksum,
        })
    }

    fn archive_files(&self, category: Category) -> [PathBuf; 4] {
        let layout = &self.config.layout;
        [
            Archive::dat_path(&layout.client, category),
            Archive::idx_path(&layout.client, category),
            Archive::dat_path(&layout.server, category),
            Archive::idx_path(&layout.server, category),
        ]
    }

    fn record_manifest(&self, category: Category, packed: &PackedCategory) -> Result<(), BuildError> {
        let path = self.config.layout.manifest();
        let base = path.parent().unwrap_or(Path::new(""));
        let mut manifest = IntegrityManifest::load(&path)?;
        let [client_dat, client_idx, server_dat, server_idx] = self.archive_files(category);
        manifest.record(manifest_key(base, &client_dat), packed.client.dat());
        manifest.record(manifest_key(base, &client_idx), &packed.client.idx());
        manifest.record(manifest_key(base, &server_dat), packed.server.dat());
        manifest.record(manifest_key(base, &server_idx), &packed.server.idx());
        manifest.save(&path)
    }

    fn load_packed(dir: &Path, category: Category) -> Result<PackedCategory, BuildError> {
        let client = Archive::load(&dir.join("client"), category)?;
        let server_dir = dir.join("server");
        let server = if Archive::exists(&server_dir, category) {
            Archive::load(&server_dir, category)?
        } else {
            Archive::new()
        };
        Ok(PackedCategory { client, server })
    }

    fn model_store(&self) -> Result<ModelStore, BuildError> {
        let dir = &self.config.layout.models;
        if !dir.is_dir() {
            return Ok(ModelStore::new());
        }
        let models = self.registries.get(Category::Model);
        let paths: Vec<(u16, PathBuf)> = collect_files(dir, Category::Model.extension())?
            .into_iter()
            .filter_map(|path| {
                let id = models.id(path.file_stem()?.to_str()?)?;
                Some((id, path))
            })
            .collect();
        Ok(ModelStore::from_paths(paths))
    }

    /// Decode a category's archives back into source text.
    pub fn unpack(&mut self, category: Category, options: &UnpackOptions) -> Result<UnpackReport, BuildError> {
        let format = Format::of(category).ok_or(BuildError::NotConfig(category))?;
        let layout = self.config.layout.clone();
        let input = options.input.clone().unwrap_or_else(|| layout.unpack.clone());
        let primary = Self::load_packed(&input, category)?;
        let comparison = if options.compare {
            Some(PackedCategory {
                client: Archive::load(&layout.client, category)?,
                server: if Archive::exists(&layout.server, category) {
                    Archive::load(&layout.server, category)?
                } else {
                    Archive::new()
                },
            })
        } else {
            None
        };

        for asset in Category::ASSETS {
            self.sync_assets(asset)?;
        }
        let models = self.model_store()?;
        models.preload(self.config.threads)?;

        let unpacked = Unpacker::new(format, &mut self.registries, Some(&models))
            .unpack(&primary, comparison.as_ref())?;

        let output = options.output.clone().unwrap_or_else(|| {
            layout
                .unpack
                .join(format!("{}.{}", category.name(), category.extension()))
        });
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(BuildError::io(parent))?;
        }
        std::fs::write(&output, &unpacked.text).map_err(BuildError::io(&output))?;

        self.registries.save(category)?;
        for referenced in format.references() {
            self.registries.save(referenced)?;
        }

        let renamed = if options.rename_models {
            let plan = RenamePlan::from_usage(&unpacked.usage, self.registries.get(Category::Model));
            let moved = plan.apply(&layout.models, self.registries.get_mut(Category::Model))?;
            self.registries.save(Category::Model)?;
            moved
        } else {
            0
        };
        for (model, users) in unpacked.usage.iter() {
            for user in users {
                self.usage.record(model, user.category, &user.debugname, &user.key);
            }
        }

        tracing::info!(
            %category,
            output = %output.display(),
            records = unpacked.records,
            reviews = unpacked.reviews,
            "unpacked"
        );
        Ok(UnpackReport {
            category,
            output,
            records: unpacked.records,
            reviews: unpacked.reviews,
            appended: unpacked.appended,
            renamed,
        })
    }

    /// Check a packed category against the manifest and checksum gate, and
    /// that every record decodes.
    pub fn validate(&self, category: Category) -> Result<ValidateReport, BuildError> {
        let format = Format::of(category).ok_or(BuildError::NotConfig(category))?;
        let manifest_path = self.config.layout.manifest();
        let base = manifest_path.parent().unwrap_or(Path::new(""));
        let manifest = IntegrityManifest::load(&manifest_path)?;
        let read = |path: &PathBuf| -> Result<Vec<u8>, BuildError> {
            let bytes = std::fs::read(path).map_err(BuildError::io(path))?;
            manifest.verify(&manifest_key(base, path), &bytes)?;
            Ok(bytes)
        };
        let [client_dat, client_idx, server_dat, server_idx] = self.archive_files(category);
        let packed = PackedCategory {
            client: Archive::from_parts(category, read(&client_dat)?, &read(&client_idx)?)?,
            server: Archive::from_parts(category, read(&server_dat)?, &read(&server_idx)?)?,
        };
        let checksum = self.gate.check(category, packed.client.crc32())?;

        let mut scratch = self.registries.clone();
        let decoded = Unpacker::new(format, &mut scratch, None).unpack(&packed, None)?;
        tracing::info!(%category, records = decoded.records, "valid");
        Ok(ValidateReport {
            category,
            records: packed.client.len(),
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;

    fn project() -> (tempfile::TempDir, BuildConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            layout: Layout::default().resolve(dir.path()),
            force: true,
            ..BuildConfig::default()
        };
        std::fs::create_dir_all(&config.layout.scripts).unwrap();
        std::fs::create_dir_all(&config.layout.models).unwrap();
        (dir, config)
    }

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn pack_writes_archives_registry_and_manifest() {
        let (_dir, config) = project();
        let layout = config.layout.clone();
        write(&layout.scripts.join("colours.constant"), "red=0xff0000\n");
        write(&layout.scripts.join("floors").join("grass.flo"), "[grass]\ncolour=^red\n[dirt]\noverlay=yes\n");

        let mut builder = Builder::new(config).unwrap().with_implementation(None);
        let report = builder.pack(Category::Flo).unwrap();
        assert_eq!(report.records, 2);
        assert!(matches!(report.checksum, ChecksumOutcome::Unfrozen(_)));

        let client = Archive::load(&layout.client, Category::Flo).unwrap();
        assert_eq!(client.get(0).unwrap(), [1, 0xff, 0, 0, 0]);
        assert_eq!(client.get(1).unwrap(), [3, 0]);
        let registry = std::fs::read_to_string(layout.pack.join("flo.pack")).unwrap();
        assert_eq!(registry, "0=grass\n1=dirt\n");

        builder.validate(Category::Flo).unwrap();
    }

    #[test]
    fn validate_detects_tampering() {
        let (_dir, config) = project();
        let layout = config.layout.clone();
        write(&layout.scripts.join("a.varp"), "[points]\nclientcode=1\n");
        let mut builder = Builder::new(config).unwrap();
        builder.pack(Category::Varp).unwrap();

        std::fs::write(Archive::dat_path(&layout.client, Category::Varp), [5, 0, 2, 0]).unwrap();
        assert!(matches!(
            builder.validate(Category::Varp),
            Err(BuildError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn strict_checksum_aborts() {
        let (_dir, mut config) = project();
        config.strict = true;
        config.checksums.insert(Category::Varp, 1);
        write(&config.layout.scripts.join("a.varp"), "[points]\nclientcode=1\n");
        let mut builder = Builder::new(config).unwrap();
        assert!(matches!(
            builder.pack(Category::Varp),
            Err(BuildError::Pack(contentpack_config::PackError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn pack_all_skips_fresh_outputs() {
        let (_dir, mut config) = project();
        config.force = false;
        write(&config.layout.scripts.join("a.varp"), "[points]\nclientcode=1\n");
        let mut builder = Builder::new(config.clone()).unwrap().with_implementation(None);
        let first = builder.pack_all().unwrap();
        assert_eq!(first.packed.len(), Category::CONFIGS.len());

        let mut again = Builder::new(config).unwrap().with_implementation(None);
        let second = again.pack_all().unwrap();
        assert!(second.packed.is_empty());
        assert_eq!(second.skipped.len(), Category::CONFIGS.len());
    }

    #[test]
    fn missing_source_root_is_reported() {
        let (_dir, config) = project();
        std::fs::remove_dir_all(&config.layout.scripts).unwrap();
        let mut builder = Builder::new(config).unwrap();
        let err = builder.pack(Category::Obj).unwrap_err();
        assert!(matches!(err, BuildError::Source(contentpack_source::SourceError::MissingRoot(_))));
    }

    #[test]
    fn asset_files_are_registered() {
        let (_dir, config) = project();
        let layout = config.layout.clone();
        write(&layout.models.join("weapons").join("sword.ob2"), "");
        write(&layout.scripts.join("items.obj"), "[sword]\nmodel=sword\n");
        let mut builder = Builder::new(config).unwrap();
        builder.pack(Category::Obj).unwrap();
        assert_eq!(builder.registries().get(Category::Model).id("sword"), Some(0));
        assert_eq!(builder.usage().users(0)[0].debugname, "sword");
        assert_eq!(
            std::fs::read_to_string(layout.pack.join("model.pack")).unwrap(),
            "0=sword\n"
        );
    }

    fn mesh() -> Vec<u8> {
        contentpack_model::Model {
            vertex_x: vec![0, 64, 0],
            vertex_y: vec![0, 0, 64],
            vertex_z: vec![0, 0, 0],
            face_a: vec![0],
            face_b: vec![1],
            face_c: vec![2],
            face_colours: vec![61],
            ..contentpack_model::Model::default()
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn placeholder_named_models_keep_their_ids() {
        let (_dir, config) = project();
        let layout = config.layout.clone();
        for name in ["model_0", "model_1", "model_2", "model_10", "boulder"] {
            std::fs::write(layout.models.join(format!("{name}.ob2")), mesh()).unwrap();
        }
        let mut client = Archive::new();
        client.push(Category::Obj, &[1, 0, 2, 0]).unwrap();
        client.save(&layout.unpack.join("client"), Category::Obj).unwrap();

        let mut builder = Builder::new(config).unwrap();
        let report = builder
            .unpack(
                Category::Obj,
                &UnpackOptions {
                    rename_models: true,
                    ..UnpackOptions::default()
                },
            )
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&report.output).unwrap(),
            "[obj_0]\nmodel=model_2\n"
        );
        assert_eq!(report.renamed, 1);
        assert!(layout.models.join("obj_obj_0_model.ob2").is_file());
        assert!(layout.models.join("model_10.ob2").is_file());
        assert_eq!(
            std::fs::read_to_string(layout.pack.join("model.pack")).unwrap(),
            "0=model_0\n1=model_1\n2=obj_obj_0_model\n10=model_10\n11=boulder\n"
        );
    }
}
