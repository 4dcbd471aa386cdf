use crate::archive::PackedCategory;
use crate::error::PackError;
use crate::field::EncodeContext;
use crate::format::{DEBUGNAME, END, Format, Op, Target};
use crate::usage::ModelUsage;
use crate::value::Value;
use contentpack_buffer::Writer;
use contentpack_registry::Registries;
use contentpack_source::{
    ConfigRecord, ParseError, ParseErrorKind, Property, RawRecord, coerce_record,
};
use std::collections::{BTreeMap, HashSet};

type Record = ConfigRecord<Value>;

/// Type raw records through a category's format.
pub fn typed_records(format: &Format, raw: &[RawRecord]) -> Result<Vec<Record>, ParseError> {
    raw.iter().map(|record| coerce_record(format, record)).collect()
}

/// Encode every record of one category into client and server archives.
///
/// Names without an id are allocated first. Records are laid out by id;
/// ids with no source record encode as an empty record. Nothing is
/// returned unless every record encodes.
pub fn pack(
    format: &Format,
    records: &[Record],
    registries: &mut Registries,
    usage: &mut ModelUsage,
) -> Result<PackedCategory, PackError> {
    let category = format.category;
    let _span = tracing::info_span!("pack", %category, records = records.len()).entered();

    let mut by_id = BTreeMap::new();
    for record in records {
        let id = registries
            .get_mut(category)
            .get_or_allocate(&record.debugname)?;
        by_id.insert(id, record);
    }

    let registries = &*registries;
    let registry = registries.get(category);
    let mut encoded = Vec::with_capacity(registry.next_id() as usize);
    for id in 0..registry.next_id() {
        let id = id as u16;
        let pair = match by_id.get(&id) {
            Some(record) => {
                let pair = encode_record(format, record, registries)?;
                tracing::trace!(id, debugname = %record.debugname, client = pair.0.len(), "encoded");
                usage.record_properties(
                    category,
                    &record.debugname,
                    record.properties.iter().map(|p| (p.key.as_str(), &p.value)),
                    registries,
                );
                pair
            }
            None => {
                let name = registry
                    .name(id)
                    .map(str::to_string)
                    .unwrap_or_else(|| category.placeholder(id));
                (vec![END], server_trailer(Writer::new(), &name))
            }
        };
        encoded.push(pair);
    }

    let mut packed = PackedCategory::default();
    for (client, server) in &encoded {
        packed.client.push(category, client)?;
        packed.server.push(category, server)?;
    }
    tracing::debug!(
        records = packed.client.len(),
        client_bytes = packed.client.dat().len(),
        server_bytes = packed.server.dat().len(),
        "packed"
    );
    Ok(packed)
}

/// Client and server bytes for one record.
pub fn encode_record(
    format: &Format,
    record: &Record,
    registries: &Registries,
) -> Result<(Vec<u8>, Vec<u8>), PackError> {
    check_recolour_pairs(record)?;
    let ctx = EncodeContext {
        category: format.category,
        debugname: &record.debugname,
        registries,
    };
    let mut client = Writer::new();
    let mut server = Writer::new();
    for (op, props) in emission_order(format, record)? {
        if op.field.is_group() {
            check_contiguous(op, &props, record)?;
        }
        if op.scope.includes(Target::Client) {
            op.field.encode(op.code, &props, &ctx, &mut client)?;
        }
        if op.scope.includes(Target::Server) {
            op.field.encode(op.code, &props, &ctx, &mut server)?;
        }
    }
    client.write_u8(END);
    Ok((client.into_bytes(), server_trailer(server, &record.debugname)))
}

fn server_trailer(mut server: Writer, debugname: &str) -> Vec<u8> {
    server.write_u8(DEBUGNAME);
    server.write_string(debugname);
    server.write_u8(END);
    server.into_bytes()
}

/// Leading ops in table order, then the rest in source order.
///
/// Group ops take every property they own at their first appearance.
fn emission_order<'f, 'r>(
    format: &'f Format,
    record: &'r Record,
) -> Result<Vec<(&'f Op, Vec<&'r Property<Value>>)>, ParseError> {
    let ops = format.ops();
    let mut assigned = Vec::with_capacity(record.properties.len());
    for prop in &record.properties {
        let index = format.op_for(&prop.key, &prop.value).ok_or_else(|| {
            ParseError::new(
                record.location_of(prop),
                ParseErrorKind::UnknownKey {
                    key: prop.key.clone(),
                },
            )
        })?;
        assigned.push((index, prop));
    }
    let owned_by = |index: usize| -> Vec<&'r Property<Value>> {
        assigned
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, p)| *p)
            .collect()
    };

    let mut order = Vec::new();
    for (index, op) in ops.iter().enumerate().filter(|(_, op)| op.leading) {
        let props = owned_by(index);
        if props.is_empty() {
            continue;
        }
        if op.field.is_group() {
            order.push((op, props));
        } else {
            order.extend(props.into_iter().map(|p| (op, vec![p])));
        }
    }

    let mut grouped = HashSet::new();
    for (index, prop) in &assigned {
        let op = &ops[*index];
        if op.leading {
            continue;
        }
        if !op.field.is_group() {
            order.push((op, vec![*prop]));
        } else if grouped.insert(*index) {
            order.push((op, owned_by(*index)));
        }
    }
    Ok(order)
}

/// Group opcodes carry a plain count, so their slots must run 1..=n.
fn check_contiguous(op: &Op, props: &[&Property<Value>], record: &Record) -> Result<(), ParseError> {
    let mut slotted: Vec<(u16, &Property<Value>)> = props
        .iter()
        .filter_map(|prop| op.field.slot(&prop.key).map(|slot| (slot, *prop)))
        .collect();
    slotted.sort_by_key(|(slot, _)| *slot);
    let mut expected = 1;
    for (slot, prop) in slotted {
        if slot == expected {
            expected += 1;
        } else if slot > expected {
            return Err(ParseError::new(
                record.location_of(prop),
                ParseErrorKind::InvalidValue {
                    key: prop.key.clone(),
                    value: prop.value.to_string(),
                    reason: format!("slot {slot} follows a gap, slot {expected} is not set"),
                },
            ));
        }
    }
    Ok(())
}

/// Every recolour slot needs both halves.
fn check_recolour_pairs(record: &Record) -> Result<(), ParseError> {
    let mut slots: BTreeMap<u8, [Option<&Property<Value>>; 2]> = BTreeMap::new();
    for prop in &record.properties {
        if let Value::Recolour(half) = &prop.value {
            slots.entry(half.slot).or_default()[half.side as usize] = Some(prop);
        }
    }
    for (slot, pair) in slots {
        let (lone, missing) = match pair {
            [Some(prop), None] => (prop, 'd'),
            [None, Some(prop)] => (prop, 's'),
            _ => continue,
        };
        return Err(ParseError::new(
            record.location_of(lone),
            ParseErrorKind::InvalidValue {
                key: lone.key.clone(),
                value: lone.value.to_string(),
                reason: format!("recolour slot {slot} has no '{missing}' half"),
            },
        ));
    }
    Ok(())
}
