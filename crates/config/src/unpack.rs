use crate::archive::{Archive, PackedCategory};
use crate::error::PackError;
use crate::field::{DecodeError, Decoded, Field};
use crate::format::{DEBUGNAME, END, Format, Scope};
use crate::usage::ModelUsage;
use crate::value::{Colour, Side, Value};
use contentpack_buffer::Reader;
use contentpack_common::Category;
use contentpack_model::ModelStore;
use contentpack_registry::Registries;
use std::collections::BTreeSet;

/// Opens a merge-review block; the primary decoding follows.
pub const REVIEW_PRIMARY: &str = "<<<<<<< primary";
pub const REVIEW_SEPARATOR: &str = "=======";
pub const REVIEW_COMPARISON: &str = ">>>>>>> comparison";

/// One decoded property and the field that renders it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedProperty {
    pub key: String,
    pub value: Value,
    pub field: Field,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub id: u16,
    pub debugname: String,
    pub properties: Vec<DecodedProperty>,
}

impl DecodedRecord {
    pub fn lines(&self) -> Vec<String> {
        self.properties
            .iter()
            .map(|p| format!("{}={}", p.key, p.field.render(&p.value)))
            .collect()
    }

    /// The record as source text, header included.
    pub fn to_text(&self) -> String {
        let mut out = format!("[{}]\n", self.debugname);
        for line in self.lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Result of unpacking one category.
#[derive(Debug, Default)]
pub struct Unpacked {
    /// Source text for every decoded record.
    pub text: String,
    pub records: usize,
    /// Records emitted as merge-review blocks.
    pub reviews: usize,
    /// Records present only in the primary archive.
    pub appended: usize,
    pub usage: ModelUsage,
}

/// Debugname carried by a server record's trailing opcode 250.
///
/// Opcode 250 cannot appear inside the UTF-8 name, so the last such byte
/// starts the trailer.
pub fn server_debugname(record: &[u8]) -> Option<String> {
    let (&END, body) = record.split_last()? else {
        return None;
    };
    let (&b'\n', body) = body.split_last()? else {
        return None;
    };
    let start = body.iter().rposition(|&b| b == DEBUGNAME)?;
    std::str::from_utf8(&body[start + 1..])
        .ok()
        .map(str::to_string)
}

/// Replays archives through a category's format.
pub struct Unpacker<'a> {
    format: &'a Format,
    registries: &'a mut Registries,
    models: Option<&'a ModelStore>,
    usage: ModelUsage,
}

impl<'a> Unpacker<'a> {
    /// `models` enables retexture detection; without it every recolour
    /// decodes as a raw colour pair.
    pub fn new(
        format: &'a Format,
        registries: &'a mut Registries,
        models: Option<&'a ModelStore>,
    ) -> Self {
        Self {
            format,
            registries,
            models,
            usage: ModelUsage::new(),
        }
    }

    fn category(&self) -> Category {
        self.format.category
    }

    /// Bind server debugnames to ids the registry does not name yet.
    fn adopt_debugnames(&mut self, server: &Archive) -> Result<(), PackError> {
        let category = self.category();
        let registry = self.registries.get_mut(category);
        for (id, record) in server.records().enumerate() {
            let id = id as u16;
            let Some(name) = server_debugname(record) else {
                continue;
            };
            if registry.name(id).is_none() && registry.id(&name).is_none() {
                registry.register(id, &name)?;
            }
        }
        Ok(())
    }

    fn stream(
        &mut self,
        id: u16,
        record: &[u8],
    ) -> Result<(Vec<DecodedProperty>, Option<String>), PackError> {
        let format = self.format;
        let category = format.category;
        let mut r = Reader::new(record);
        let mut properties = Vec::new();
        let mut debugname = None;
        let truncated = |source| PackError::Truncated {
            category,
            id,
            source,
        };
        loop {
            let offset = r.position();
            let code = r.read_u8().map_err(truncated)?;
            if code == END {
                break;
            }
            if code == DEBUGNAME {
                debugname = Some(r.read_string().map_err(truncated)?);
                continue;
            }
            let op = format.op(code).ok_or(PackError::UnknownOpcode {
                category,
                id,
                opcode: code,
                offset,
            })?;
            let mut decoded = Decoded::new();
            op.field
                .decode(&mut r, self.registries, &mut decoded)
                .map_err(|e| match e {
                    DecodeError::Buffer(source) => truncated(source),
                    DecodeError::Registry(e) => PackError::Registry(e),
                })?;
            properties.extend(decoded.into_iter().map(|(key, value)| DecodedProperty {
                key,
                value,
                field: op.field,
            }));
        }
        Ok((properties, debugname))
    }

    /// Decode one id from both encodings.
    ///
    /// Server-only properties are merged after the client ones. Returns
    /// `None` for an empty record whose id has no name.
    pub fn decode(
        &mut self,
        id: u16,
        packed: &PackedCategory,
    ) -> Result<Option<DecodedRecord>, PackError> {
        let category = self.category();
        let client = match packed.client.get(id as usize) {
            Some(record) => Some(self.stream(id, record)?.0),
            None => None,
        };
        let (server, server_name) = match packed.server.get(id as usize) {
            Some(record) => self.stream(id, record)?,
            None => (Vec::new(), None),
        };
        let mut properties = match client {
            Some(client) => self.interleave(client, server),
            None => server,
        };

        let known = self.registries.get(category).name(id).map(str::to_string);
        let debugname = match (known, server_name) {
            (Some(name), _) => name,
            (None, _) if properties.is_empty() => return Ok(None),
            (None, Some(name)) => name,
            (None, None) => self.registries.get_mut(category).placeholder(id)?,
        };

        self.detect_retextures(&mut properties)?;
        self.usage.record_properties(
            category,
            &debugname,
            properties.iter().map(|p| (p.key.as_str(), &p.value)),
            self.registries,
        );
        Ok(Some(DecodedRecord {
            id,
            debugname,
            properties,
        }))
    }

    /// Merge the two streams, keeping the relative order of each.
    ///
    /// Shared properties appear in both; server-only ones are placed
    /// before the next shared property that follows them.
    fn interleave(
        &self,
        client: Vec<DecodedProperty>,
        server: Vec<DecodedProperty>,
    ) -> Vec<DecodedProperty> {
        let mut merged = Vec::with_capacity(client.len() + server.len());
        let mut server = server.into_iter().peekable();
        for property in client {
            if self.scope_of(&property) == Scope::Both {
                while let Some(only) = server.next_if(|p| self.scope_of(p) == Scope::Server) {
                    merged.push(only);
                }
                server.next_if(|p| *p == property);
            }
            merged.push(property);
        }
        merged.extend(server.filter(|p| self.scope_of(p) == Scope::Server));
        merged
    }

    fn scope_of(&self, property: &DecodedProperty) -> Scope {
        self.format
            .ops()
            .iter()
            .find(|op| op.field == property.field)
            .map(|op| op.scope)
            .unwrap_or(Scope::Both)
    }

    /// Rewrite recolour slots as retextures when a model of the record
    /// shows the source colour as a texture.
    fn detect_retextures(&mut self, properties: &mut [DecodedProperty]) -> Result<(), PackError> {
        let Some(store) = self.models else {
            return Ok(());
        };
        let model_registry = self.registries.get(Category::Model);
        let mut models = Vec::new();
        for property in properties.iter() {
            let Some(id) = property.value.model().and_then(|name| model_registry.id(name)) else {
                continue;
            };
            if let Some(model) = store.get(id) {
                models.push(model?);
            }
        }
        if models.is_empty() {
            return Ok(());
        }

        let textured: BTreeSet<u8> = properties
            .iter()
            .filter_map(|p| match &p.value {
                Value::Recolour(half) => match (half.side, &half.colour) {
                    (Side::Source, Colour::Rgb(colour))
                        if models.iter().any(|m| m.has_texture(*colour)) =>
                    {
                        Some(half.slot)
                    }
                    _ => None,
                },
                _ => None,
            })
            .collect();

        for property in properties.iter_mut() {
            let Value::Recolour(half) = &mut property.value else {
                continue;
            };
            let Colour::Rgb(texture) = half.colour else {
                continue;
            };
            if !textured.contains(&half.slot) {
                continue;
            }
            let name = self
                .registries
                .get_mut(Category::Texture)
                .placeholder(texture)?;
            half.colour = Colour::Texture(name);
            property.key = half.key();
        }
        Ok(())
    }

    /// Decode every record of `primary`, reviewing against `comparison`.
    ///
    /// Without a comparison each record is emitted in id order. With one,
    /// ids both archives hold are emitted once when their decodings agree
    /// and as a review block otherwise; ids only the primary holds are
    /// appended at the end.
    pub fn unpack(
        mut self,
        primary: &PackedCategory,
        comparison: Option<&PackedCategory>,
    ) -> Result<Unpacked, PackError> {
        let category = self.category();
        let _span = tracing::info_span!("unpack", %category, records = primary.client.len()).entered();
        self.adopt_debugnames(&primary.server)?;

        let mut out = Unpacked::default();
        let primary_len = primary.client.len().max(primary.server.len());
        let mut blocks = Vec::new();
        match comparison {
            None => {
                for id in 0..primary_len {
                    if let Some(record) = self.decode(id as u16, primary)? {
                        blocks.push(record.to_text());
                        out.records += 1;
                    }
                }
            }
            Some(comparison) => {
                let shared_len = comparison.client.len().max(comparison.server.len());
                for id in 0..shared_len {
                    let id = id as u16;
                    let reference = self.decode(id, comparison)?;
                    let current = if (id as usize) < primary_len {
                        self.decode(id, primary)?
                    } else {
                        None
                    };
                    let block = match (current, reference) {
                        (Some(current), Some(reference)) if current.lines() != reference.lines() => {
                            out.reviews += 1;
                            tracing::warn!(id, debugname = %current.debugname, "decodings differ");
                            format!(
                                "{REVIEW_PRIMARY} [{}]\n{}{REVIEW_SEPARATOR}\n{}{REVIEW_COMPARISON}\n",
                                current.debugname,
                                current.to_text(),
                                reference.to_text()
                            )
                        }
                        (Some(record), _) | (None, Some(record)) => record.to_text(),
                        (None, None) => continue,
                    };
                    out.records += 1;
                    blocks.push(block);
                }
                for id in shared_len..primary_len {
                    if let Some(record) = self.decode(id as u16, primary)? {
                        out.appended += 1;
                        out.records += 1;
                        blocks.push(record.to_text());
                    }
                }
            }
        }

        out.text = blocks.join("\n");
        out.usage = self.usage;
        tracing::debug!(
            records = out.records,
            reviews = out.reviews,
            appended = out.appended,
            "unpacked"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{pack, typed_records};
    use contentpack_model::{FACE_TEXTURED, Model};
    use contentpack_source::{ConstantTable, SourceParser};
    use std::path::Path;

    fn pack_text(category: Category, text: &str, regs: &mut Registries) -> PackedCategory {
        let constants = ConstantTable::new();
        let mut parser = SourceParser::new(&constants);
        parser
            .parse_file(Path::new(&format!("test.{category}")), text)
            .unwrap();
        let format = Format::of(category).unwrap();
        let records = typed_records(format, &parser.finish()).unwrap();
        pack(format, &records, regs, &mut ModelUsage::new()).unwrap()
    }

    fn assets() -> Registries {
        let mut regs = Registries::empty("unused");
        regs.get_mut(Category::Model).register(0, "model_0").unwrap();
        regs.get_mut(Category::Model).register(1, "model_1").unwrap();
        regs.get_mut(Category::Seq).register(0, "idle").unwrap();
        regs.get_mut(Category::Texture).register(5, "brick").unwrap();
        regs
    }

    fn unpack(category: Category, packed: &PackedCategory, regs: &mut Registries) -> Unpacked {
        Unpacker::new(Format::of(category).unwrap(), regs, None)
            .unpack(packed, None)
            .unwrap()
    }

    const LOC: &str = "\
[rock]
name=Rock
width=2
blockwalk=no
model=model_0
recol1s=10
recol1d=20
desc=A rock.
op1=Mine
ambient=-5

[wall]
model=model_1,wall_l
model=model_0
active=yes
";

    #[test]
    fn round_trip_reorders_leading_fields() {
        let mut regs = assets();
        let packed = pack_text(Category::Loc, LOC, &mut regs);
        let text = unpack(Category::Loc, &packed, &mut regs).text;
        assert_eq!(
            text,
            "[rock]\nmodel=model_0\nname=Rock\ndesc=A rock.\nrecol1s=10\nrecol1d=20\nwidth=2\nblockwalk=no\nop1=Mine\nambient=-5\n\n\
             [wall]\nmodel=model_1,wall_l\nmodel=model_0\nactive=yes\n"
        );

        // a second pass is byte-identical
        let repacked = pack_text(Category::Loc, &text, &mut regs);
        assert_eq!(repacked, packed);
        assert_eq!(unpack(Category::Loc, &repacked, &mut regs).text, text);
    }

    #[test]
    fn server_names_and_fields_survive() {
        let mut regs = assets();
        let packed = pack_text(Category::Varp, "[quest_points]\nscope=perm\ntype=int\nclientcode=3\nprotect=no\n", &mut regs);

        let mut fresh = Registries::empty("unused");
        let text = unpack(Category::Varp, &packed, &mut fresh).text;
        assert_eq!(text, "[quest_points]\nclientcode=3\nscope=perm\ntype=int\nprotect=no\n");
        assert_eq!(fresh.get(Category::Varp).id("quest_points"), Some(0));
    }

    #[test]
    fn placeholders_for_unnamed_references() {
        let mut regs = assets();
        let packed = pack_text(Category::Npc, "[man]\nreadyanim=idle\n", &mut regs);
        let mut fresh = Registries::empty("unused");
        let text = unpack(Category::Npc, &packed, &mut fresh).text;
        assert_eq!(text, "[man]\nreadyanim=seq_0\n");
        assert_eq!(fresh.get(Category::Seq).name(0), Some("seq_0"));
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut client = Archive::new();
        client.push(Category::Obj, &[2, b'x', b'\n', 199, 0]).unwrap();
        let packed = PackedCategory {
            client,
            server: Archive::new(),
        };
        let mut regs = Registries::empty("unused");
        let err = Unpacker::new(Format::of(Category::Obj).unwrap(), &mut regs, None)
            .unpack(&packed, None)
            .unwrap_err();
        assert!(matches!(
            err,
            PackError::UnknownOpcode {
                category: Category::Obj,
                id: 0,
                opcode: 199,
                offset: 3
            }
        ));
    }

    #[test]
    fn truncated_record_is_reported() {
        let mut client = Archive::new();
        client.push(Category::Obj, &[12, 0, 0]).unwrap();
        let packed = PackedCategory {
            client,
            server: Archive::new(),
        };
        let mut regs = Registries::empty("unused");
        let err = Unpacker::new(Format::of(Category::Obj).unwrap(), &mut regs, None)
            .unpack(&packed, None)
            .unwrap_err();
        assert!(matches!(err, PackError::Truncated { id: 0, .. }));
    }

    #[test]
    fn comparison_review_and_append() {
        let mut regs = assets();
        let primary = pack_text(
            Category::Obj,
            "[a]\ncost=1\n[b]\ncost=2\n[c]\ncost=3\n",
            &mut regs,
        );
        let mut reference_regs = assets();
        let reference = pack_text(Category::Obj, "[a]\ncost=1\n[b]\ncost=99\n", &mut reference_regs);

        let out = Unpacker::new(Format::of(Category::Obj).unwrap(), &mut regs, None)
            .unpack(&primary, Some(&reference))
            .unwrap();
        assert_eq!(out.reviews, 1);
        assert_eq!(out.appended, 1);
        assert_eq!(out.records, 3);
        assert_eq!(
            out.text,
            "[a]\ncost=1\n\n\
             <<<<<<< primary [b]\n[b]\ncost=2\n=======\n[b]\ncost=99\n>>>>>>> comparison\n\n\
             [c]\ncost=3\n"
        );
    }

    #[test]
    fn textured_recolours_decode_as_retex() {
        let textured = Model {
            vertex_x: vec![0, 1, 0],
            vertex_y: vec![0, 0, 1],
            vertex_z: vec![0, 0, 0],
            face_a: vec![0],
            face_b: vec![1],
            face_c: vec![2],
            face_colours: vec![5],
            face_infos: Some(vec![FACE_TEXTURED]),
            ..Model::default()
        };
        let store = ModelStore::from_blobs([(0, textured.encode().unwrap())]);
        let mut regs = assets();
        let text = "[crate]\nmodel=model_0\nretex1s=brick\nretex1d=brick\nrecol2s=7\nrecol2d=8\n";
        let packed = pack_text(Category::Obj, text, &mut regs);

        let out = Unpacker::new(Format::of(Category::Obj).unwrap(), &mut regs, Some(&store))
            .unpack(&packed, None)
            .unwrap();
        assert_eq!(out.text, text);
        assert_eq!(out.usage.users(0)[0].debugname, "crate");

        // without models the same bytes decode as raw colours
        let plain = unpack(Category::Obj, &packed, &mut regs).text;
        assert!(plain.contains("recol1s=5\n"));
    }

    #[test]
    fn server_trailer_name() {
        assert_eq!(server_debugname(&[12, 0, 0, 0, 1, 250, b'a', b'b', b'\n', 0]), Some("ab".into()));
        assert_eq!(server_debugname(&[0]), None);
        assert_eq!(server_debugname(&[]), None);
    }
}
