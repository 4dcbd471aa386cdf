//! Property codecs shared by the packer and the unpacker.
//!
//! A [`Field`] knows which source keys it owns, how to type their text,
//! how to write them after its opcode, and how to read them back.

use crate::error::PackError;
use crate::value::{Colour, DEFAULT_SHAPE, Recolour, Side, Value, parse_bool, parse_int, parse_shape};
use contentpack_buffer::{BufferError, Reader, Writer};
use contentpack_common::Category;
use contentpack_registry::{RegistryError, Registries};
use contentpack_source::{CoerceError, Property};
use std::collections::BTreeMap;

/// Frame slot value meaning "no interpolation frame".
const NO_IFRAME: u16 = 0xFFFF;

/// Offset added to obj ids in `replaceheld*`; zero means hide.
const HELD_OBJ_OFFSET: u16 = 512;

/// Wire width of a scalar integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U8,
    I8,
    U16,
    I16,
    U24,
    I32,
}

impl Width {
    fn bounds(self) -> (i64, i64) {
        match self {
            Width::U8 => (0, u8::MAX as i64),
            Width::I8 => (i8::MIN as i64, i8::MAX as i64),
            Width::U16 => (0, u16::MAX as i64),
            Width::I16 => (i16::MIN as i64, i16::MAX as i64),
            Width::U24 => (0, 0xFF_FFFF),
            Width::I32 => (i32::MIN as i64, i32::MAX as i64),
        }
    }

    fn coerce(self, text: &str) -> Result<i32, CoerceError> {
        let (min, max) = self.bounds();
        match parse_int(text) {
            Some(v) if (min..=max).contains(&v) => Ok(v as i32),
            Some(_) => Err(CoerceError::Invalid(format!("expected {min}..={max}"))),
            None => Err(CoerceError::Invalid("expected an integer".into())),
        }
    }

    fn fits(self, v: i64) -> bool {
        let (min, max) = self.bounds();
        (min..=max).contains(&v)
    }

    fn write(self, w: &mut Writer, v: i32) {
        match self {
            Width::U8 => w.write_u8(v as u8),
            Width::I8 => w.write_i8(v as i8),
            Width::U16 => w.write_u16(v as u16),
            Width::I16 => w.write_i16(v as i16),
            Width::U24 => w.write_u24(v as u32),
            Width::I32 => w.write_i32(v),
        }
    }

    fn read(self, r: &mut Reader<'_>) -> Result<i32, BufferError> {
        Ok(match self {
            Width::U8 => r.read_u8()? as i32,
            Width::I8 => r.read_i8()? as i32,
            Width::U16 => r.read_u16()? as i32,
            Width::I16 => r.read_i16()? as i32,
            Width::U24 => r.read_u24()? as i32,
            Width::I32 => r.read_i32()?,
        })
    }
}

/// How one opcode's payload maps to source properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Int(&'static str, Width),
    /// 24-bit RGB, written in source as `0xRRGGBB`.
    Colour(&'static str),
    /// Payload-free opcode, present only when the key has the given value.
    Flag(&'static str, bool),
    /// `yes`/`no` as one byte.
    Bool(&'static str),
    Text(&'static str),
    /// Symbolic names for a one-byte value.
    Enum(&'static str, &'static [(&'static str, u8)]),
    Ref(&'static str, Category, Width),
    /// Held obj replacement: obj id + 512, or `hide`.
    Held(&'static str),
    /// Wear model plus a signed offset.
    Wear(&'static str),
    /// Stack-size variant: obj and amount.
    Count(&'static str),
    Labels(&'static str),
    WalkAnims(&'static str),
    /// `<prefix>1..N` references, written as count then u16 ids.
    RefList(&'static str, Category),
    /// Repeated `model=name[,shape]`, written as count then (u16, u8).
    LocModels,
    /// `frameN`, `iframeN`, `delayN`.
    Frames,
    /// Paired recolour table: count then (source, dest) u16 pairs.
    Recolours,
    /// One recolour half with its own opcode.
    RecolourHalf(u8, Side),
}

/// What a field needs while encoding one record.
pub struct EncodeContext<'a> {
    pub category: Category,
    pub debugname: &'a str,
    pub registries: &'a Registries,
}

impl EncodeContext<'_> {
    fn resolve(&self, category: Category, name: &str) -> Result<u16, PackError> {
        Ok(self.registries.resolve(category, name, self.category)?)
    }

    fn error(&self, key: &str, message: impl Into<String>) -> PackError {
        PackError::Encode {
            category: self.category,
            debugname: self.debugname.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    fn mismatch(&self, key: &str, value: &Value) -> PackError {
        self.error(key, format!("value '{value}' does not fit this property"))
    }

    fn count(&self, key: &str, n: usize) -> Result<u8, PackError> {
        u8::try_from(n).map_err(|_| self.error(key, format!("{n} entries, at most 255 allowed")))
    }
}

/// Failure while replaying a record's opcode stream.
#[derive(Debug)]
pub enum DecodeError {
    Buffer(BufferError),
    Registry(RegistryError),
}

impl From<BufferError> for DecodeError {
    fn from(e: BufferError) -> Self {
        DecodeError::Buffer(e)
    }
}

impl From<RegistryError> for DecodeError {
    fn from(e: RegistryError) -> Self {
        DecodeError::Registry(e)
    }
}

/// Decoded `(key, value)` pairs in stream order.
pub type Decoded = Vec<(String, Value)>;

fn name(registries: &mut Registries, category: Category, id: u16) -> Result<Value, DecodeError> {
    let name = registries.get_mut(category).placeholder(id)?;
    Ok(Value::reference(category, name))
}

fn indexed(key: &str, prefix: &str) -> Option<u16> {
    let index: u16 = key.strip_prefix(prefix)?.parse().ok()?;
    (index >= 1).then_some(index)
}

fn frame_key(key: &str) -> Option<(&'static str, u16)> {
    ["frame", "iframe", "delay"]
        .into_iter()
        .find_map(|prefix| indexed(key, prefix).map(|i| (prefix, i)))
}

fn reference(category: Category, text: &str) -> Result<Value, CoerceError> {
    let name = text.trim();
    if name.is_empty() || name.contains(|c: char| c == ',' || c.is_whitespace()) {
        return Err(CoerceError::Invalid(format!("expected a {category} name")));
    }
    Ok(Value::reference(category, name))
}

fn split_pair(text: &str) -> (&str, Option<&str>) {
    match text.split_once(',') {
        Some((a, b)) => (a.trim(), Some(b.trim())),
        None => (text.trim(), None),
    }
}

impl Field {
    /// Whether `key` belongs to this field.
    pub fn claims(&self, key: &str) -> bool {
        match *self {
            Field::Int(k, _)
            | Field::Colour(k)
            | Field::Flag(k, _)
            | Field::Bool(k)
            | Field::Text(k)
            | Field::Enum(k, _)
            | Field::Ref(k, _, _)
            | Field::Held(k)
            | Field::Wear(k)
            | Field::Count(k)
            | Field::Labels(k)
            | Field::WalkAnims(k) => key == k,
            Field::RefList(prefix, _) => indexed(key, prefix).is_some(),
            Field::LocModels => key == "model",
            Field::Frames => frame_key(key).is_some(),
            Field::Recolours => Recolour::parse_key(key).is_some(),
            Field::RecolourHalf(slot, side) => {
                matches!(Recolour::parse_key(key), Some((_, s, d)) if s == slot && d == side)
            }
        }
    }

    /// Whether an already typed value is encoded by this field.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Field::WalkAnims(_) => matches!(value, Value::WalkAnims(_)),
            Field::Ref(..) => matches!(value, Value::Ref { .. }),
            _ => true,
        }
    }

    /// 1-based slot a group property fills: `model3` is slot 3 of a list.
    pub fn slot(&self, key: &str) -> Option<u16> {
        match *self {
            Field::RefList(prefix, _) => indexed(key, prefix),
            Field::Frames => frame_key(key).map(|(_, index)| index),
            Field::Recolours => Recolour::parse_key(key).map(|(_, slot, _)| slot as u16),
            _ => None,
        }
    }

    /// Fields that gather every property they claim into one opcode.
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            Field::RefList(..) | Field::LocModels | Field::Frames | Field::Recolours
        )
    }

    /// Type the text of a property this field claims.
    pub fn coerce(&self, key: &str, text: &str) -> Result<Value, CoerceError> {
        let text = text.trim();
        match *self {
            Field::Int(_, width) => width.coerce(text).map(Value::Int),
            Field::Colour(_) => Width::U24.coerce(text).map(Value::Int),
            Field::Flag(..) | Field::Bool(_) => parse_bool(text)
                .map(Value::Bool)
                .ok_or_else(|| CoerceError::Invalid("expected yes or no".into())),
            Field::Text(_) => Ok(Value::Text(text.to_string())),
            Field::Enum(_, names) => names
                .iter()
                .find(|(name, _)| *name == text)
                .map(|(_, v)| Value::Int(*v as i32))
                .or_else(|| text.parse::<u8>().ok().map(|v| Value::Int(v as i32)))
                .ok_or_else(|| {
                    let known: Vec<&str> = names.iter().map(|(n, _)| *n).collect();
                    CoerceError::Invalid(format!("expected one of {}", known.join(", ")))
                }),
            Field::Ref(_, category, _) | Field::RefList(_, category) => reference(category, text),
            Field::Held(_) => match text {
                "hide" => Ok(Value::Hide),
                _ => match parse_int(text) {
                    Some(raw) if (1..HELD_OBJ_OFFSET as i64).contains(&raw) => Ok(Value::Int(raw as i32)),
                    Some(_) => Err(CoerceError::Invalid(format!(
                        "expected hide, an obj name or 1..{HELD_OBJ_OFFSET}"
                    ))),
                    None => reference(Category::Obj, text),
                },
            },
            Field::Wear(_) => {
                let (model, offset) = split_pair(text);
                let offset = match offset {
                    Some(o) => Width::I8.coerce(o)? as i8,
                    None => 0,
                };
                match reference(Category::Model, model)? {
                    Value::Ref { name, .. } => Ok(Value::Wear {
                        model: name,
                        offset,
                    }),
                    other => Ok(other),
                }
            }
            Field::Count(_) => {
                let (obj, amount) = split_pair(text);
                let amount = amount
                    .ok_or_else(|| CoerceError::Invalid("expected obj,amount".into()))
                    .and_then(|a| Width::U16.coerce(a))?;
                match reference(Category::Obj, obj)? {
                    Value::Ref { name, .. } => Ok(Value::Count {
                        obj: name,
                        amount: amount as u16,
                    }),
                    other => Ok(other),
                }
            }
            Field::Labels(_) => text
                .split(',')
                .map(|label| Width::U8.coerce(label).map(|v| v as u8))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Labels),
            Field::WalkAnims(_) => {
                let seqs: Vec<&str> = text.split(',').map(str::trim).collect();
                let [walk, back, left, right] = seqs.as_slice() else {
                    return Err(CoerceError::Invalid(
                        "expected walk,turnback,turnleft,turnright".into(),
                    ));
                };
                for seq in [walk, back, left, right] {
                    reference(Category::Seq, seq)?;
                }
                Ok(Value::WalkAnims(
                    [walk, back, left, right].map(|s| s.to_string()),
                ))
            }
            Field::LocModels => {
                let (model, shape) = split_pair(text);
                let shape = match shape {
                    Some(s) => parse_shape(s)
                        .ok_or_else(|| CoerceError::Invalid(format!("unknown shape '{s}'")))?,
                    None => DEFAULT_SHAPE,
                };
                match reference(Category::Model, model)? {
                    Value::Ref { name, .. } => Ok(Value::LocModel { model: name, shape }),
                    other => Ok(other),
                }
            }
            Field::Frames => match frame_key(key) {
                Some(("delay", _)) => Width::U16.coerce(text).map(Value::Int),
                _ => reference(Category::Anim, text),
            },
            Field::Recolours | Field::RecolourHalf(..) => {
                let Some((texture, slot, side)) = Recolour::parse_key(key) else {
                    return Err(CoerceError::UnknownKey);
                };
                let colour = if texture {
                    match reference(Category::Texture, text)? {
                        Value::Ref { name, .. } => Colour::Texture(name),
                        _ => return Err(CoerceError::Invalid("expected a texture".into())),
                    }
                } else {
                    Colour::Rgb(Width::U16.coerce(text)? as u16)
                };
                Ok(Value::Recolour(Recolour { slot, side, colour }))
            }
        }
    }

    /// Write `code` and the payload for `props`.
    ///
    /// Non-group fields receive exactly one property.
    pub fn encode(
        &self,
        code: u8,
        props: &[&Property<Value>],
        ctx: &EncodeContext<'_>,
        w: &mut Writer,
    ) -> Result<(), PackError> {
        let Some(first) = props.first() else {
            return Ok(());
        };
        let (key, value) = (first.key.as_str(), &first.value);
        match (*self, value) {
            (Field::Flag(_, when), Value::Bool(b)) => {
                if *b == when {
                    w.write_u8(code);
                }
            }
            (Field::Int(_, width), Value::Int(v)) => {
                w.write_u8(code);
                width.write(w, *v);
            }
            (Field::Colour(_), Value::Int(v)) => {
                w.write_u8(code);
                w.write_u24(*v as u32);
            }
            (Field::Enum(..), Value::Int(v)) => {
                w.write_u8(code);
                w.write_u8(*v as u8);
            }
            (Field::Bool(_), Value::Bool(b)) => {
                w.write_u8(code);
                w.write_bool(*b);
            }
            (Field::Text(_), Value::Text(text)) => {
                w.write_u8(code);
                w.write_string(text);
            }
            (Field::Ref(_, category, width), Value::Ref { name, .. }) => {
                let id = ctx.resolve(category, name)?;
                if !width.fits(id as i64) {
                    return Err(ctx.error(key, format!("{category} id {id} does not fit")));
                }
                w.write_u8(code);
                width.write(w, id as i32);
            }
            (Field::Held(_), held) => {
                let raw = match held {
                    Value::Hide => 0,
                    Value::Int(raw) => *raw as u16,
                    Value::Ref { name, .. } => {
                        let id = ctx.resolve(Category::Obj, name)?;
                        id.checked_add(HELD_OBJ_OFFSET)
                            .ok_or_else(|| ctx.error(key, format!("obj id {id} does not fit")))?
                    }
                    other => return Err(ctx.mismatch(key, other)),
                };
                w.write_u8(code);
                w.write_u16(raw);
            }
            (Field::Wear(_), Value::Wear { model, offset }) => {
                let id = ctx.resolve(Category::Model, model)?;
                w.write_u8(code);
                w.write_u16(id);
                w.write_i8(*offset);
            }
            (Field::Count(_), Value::Count { obj, amount }) => {
                let id = ctx.resolve(Category::Obj, obj)?;
                w.write_u8(code);
                w.write_u16(id);
                w.write_u16(*amount);
            }
            (Field::Labels(_), Value::Labels(labels)) => {
                w.write_u8(code);
                w.write_u8(ctx.count(key, labels.len())?);
                w.write_bytes(labels);
            }
            (Field::WalkAnims(_), Value::WalkAnims(seqs)) => {
                let mut ids = [0u16; 4];
                for (slot, seq) in ids.iter_mut().zip(seqs) {
                    *slot = ctx.resolve(Category::Seq, seq)?;
                }
                w.write_u8(code);
                for id in ids {
                    w.write_u16(id);
                }
            }
            (Field::RecolourHalf(..), Value::Recolour(half)) => {
                let colour = colour_id(&half.colour, ctx)?;
                w.write_u8(code);
                w.write_u16(colour);
            }
            (Field::RefList(prefix, category), _) => {
                let mut refs = Vec::with_capacity(props.len());
                for prop in props {
                    let (Some(index), Value::Ref { name, .. }) = (indexed(&prop.key, prefix), &prop.value) else {
                        return Err(ctx.mismatch(&prop.key, &prop.value));
                    };
                    refs.push((index, ctx.resolve(category, name)?));
                }
                refs.sort_by_key(|(index, _)| *index);
                w.write_u8(code);
                w.write_u8(ctx.count(key, refs.len())?);
                for (_, id) in refs {
                    w.write_u16(id);
                }
            }
            (Field::LocModels, _) => {
                let mut models = Vec::with_capacity(props.len());
                for prop in props {
                    let Value::LocModel { model, shape } = &prop.value else {
                        return Err(ctx.mismatch(&prop.key, &prop.value));
                    };
                    models.push((ctx.resolve(Category::Model, model)?, *shape));
                }
                w.write_u8(code);
                w.write_u8(ctx.count(key, models.len())?);
                for (id, shape) in models {
                    w.write_u16(id);
                    w.write_u8(shape);
                }
            }
            (Field::Frames, _) => encode_frames(code, props, ctx, w)?,
            (Field::Recolours, _) => {
                let mut slots: BTreeMap<u8, [Option<u16>; 2]> = BTreeMap::new();
                for prop in props {
                    let Value::Recolour(half) = &prop.value else {
                        return Err(ctx.mismatch(&prop.key, &prop.value));
                    };
                    let pair = slots.entry(half.slot).or_default();
                    pair[half.side as usize] = Some(colour_id(&half.colour, ctx)?);
                }
                w.write_u8(code);
                w.write_u8(ctx.count(key, slots.len())?);
                for (slot, pair) in slots {
                    let [Some(source), Some(dest)] = pair else {
                        return Err(ctx.error(key, format!("recolour slot {slot} is incomplete")));
                    };
                    w.write_u16(source);
                    w.write_u16(dest);
                }
            }
            (_, other) => return Err(ctx.mismatch(key, other)),
        }
        Ok(())
    }

    /// Read this field's payload; the opcode has already been consumed.
    pub fn decode(
        &self,
        r: &mut Reader<'_>,
        registries: &mut Registries,
        out: &mut Decoded,
    ) -> Result<(), DecodeError> {
        let mut push = |key: &str, value: Value| out.push((key.to_string(), value));
        match *self {
            Field::Int(key, width) => push(key, Value::Int(width.read(r)?)),
            Field::Colour(key) => push(key, Value::Int(r.read_u24()? as i32)),
            Field::Flag(key, when) => push(key, Value::Bool(when)),
            Field::Bool(key) => push(key, Value::Bool(r.read_bool()?)),
            Field::Text(key) => push(key, Value::Text(r.read_string()?)),
            Field::Enum(key, _) => push(key, Value::Int(r.read_u8()? as i32)),
            Field::Ref(key, category, width) => {
                let id = width.read(r)? as u16;
                push(key, name(registries, category, id)?);
            }
            Field::Held(key) => {
                let value = match r.read_u16()? {
                    0 => Value::Hide,
                    raw if raw >= HELD_OBJ_OFFSET => {
                        name(registries, Category::Obj, raw - HELD_OBJ_OFFSET)?
                    }
                    raw => Value::Int(raw as i32),
                };
                push(key, value);
            }
            Field::Wear(key) => {
                let model = registries.get_mut(Category::Model).placeholder(r.read_u16()?)?;
                let offset = r.read_i8()?;
                push(key, Value::Wear { model, offset });
            }
            Field::Count(key) => {
                let obj = registries.get_mut(Category::Obj).placeholder(r.read_u16()?)?;
                let amount = r.read_u16()?;
                push(key, Value::Count { obj, amount });
            }
            Field::Labels(key) => {
                let count = r.read_u8()? as usize;
                push(key, Value::Labels(r.read_bytes(count)?.to_vec()));
            }
            Field::WalkAnims(key) => {
                let mut seqs: [String; 4] = Default::default();
                for seq in &mut seqs {
                    *seq = registries.get_mut(Category::Seq).placeholder(r.read_u16()?)?;
                }
                push(key, Value::WalkAnims(seqs));
            }
            Field::RefList(prefix, category) => {
                for index in 1..=r.read_u8()? as u16 {
                    let id = r.read_u16()?;
                    push(&format!("{prefix}{index}"), name(registries, category, id)?);
                }
            }
            Field::LocModels => {
                for _ in 0..r.read_u8()? {
                    let model = registries.get_mut(Category::Model).placeholder(r.read_u16()?)?;
                    let shape = r.read_u8()?;
                    push("model", Value::LocModel { model, shape });
                }
            }
            Field::Frames => {
                for index in 1..=r.read_u8()? as u16 {
                    let frame = r.read_u16()?;
                    let iframe = r.read_u16()?;
                    let delay = r.read_u16()?;
                    push(&format!("frame{index}"), name(registries, Category::Anim, frame)?);
                    if iframe != NO_IFRAME {
                        push(&format!("iframe{index}"), name(registries, Category::Anim, iframe)?);
                    }
                    if delay != 0 {
                        push(&format!("delay{index}"), Value::Int(delay as i32));
                    }
                }
            }
            Field::Recolours => {
                for slot in 1..=r.read_u8()? {
                    for side in [Side::Source, Side::Dest] {
                        let half = Recolour {
                            slot,
                            side,
                            colour: Colour::Rgb(r.read_u16()?),
                        };
                        push(&half.key(), Value::Recolour(half));
                    }
                }
            }
            Field::RecolourHalf(slot, side) => {
                let half = Recolour {
                    slot,
                    side,
                    colour: Colour::Rgb(r.read_u16()?),
                };
                push(&half.key(), Value::Recolour(half));
            }
        }
        Ok(())
    }

    /// Source text for a decoded value.
    pub fn render(&self, value: &Value) -> String {
        match (self, value) {
            (Field::Colour(_), Value::Int(v)) => format!("0x{v:06x}"),
            (Field::Enum(_, names), Value::Int(v)) => names
                .iter()
                .find(|(_, code)| *code as i32 == *v)
                .map(|(name, _)| name.to_string())
                .unwrap_or_else(|| v.to_string()),
            _ => value.to_string(),
        }
    }
}

fn colour_id(colour: &Colour, ctx: &EncodeContext<'_>) -> Result<u16, PackError> {
    match colour {
        Colour::Rgb(rgb) => Ok(*rgb),
        Colour::Texture(name) => ctx.resolve(Category::Texture, name),
    }
}

#[derive(Default)]
struct FrameSlot {
    frame: Option<u16>,
    iframe: Option<u16>,
    delay: u16,
}

fn encode_frames(
    code: u8,
    props: &[&Property<Value>],
    ctx: &EncodeContext<'_>,
    w: &mut Writer,
) -> Result<(), PackError> {
    let mut slots: BTreeMap<u16, FrameSlot> = BTreeMap::new();
    for prop in props {
        let Some((part, index)) = frame_key(&prop.key) else {
            return Err(ctx.mismatch(&prop.key, &prop.value));
        };
        let slot = slots.entry(index).or_default();
        match (part, &prop.value) {
            ("delay", Value::Int(delay)) => slot.delay = *delay as u16,
            ("frame", Value::Ref { name, .. }) => {
                slot.frame = Some(ctx.resolve(Category::Anim, name)?)
            }
            ("iframe", Value::Ref { name, .. }) => {
                slot.iframe = Some(ctx.resolve(Category::Anim, name)?)
            }
            _ => return Err(ctx.mismatch(&prop.key, &prop.value)),
        }
    }
    w.write_u8(code);
    w.write_u8(ctx.count("frame", slots.len())?);
    for (index, slot) in slots {
        let frame = slot
            .frame
            .ok_or_else(|| ctx.error(&format!("frame{index}"), "iframe or delay without a frame"))?;
        w.write_u16(frame);
        w.write_u16(slot.iframe.unwrap_or(NO_IFRAME));
        w.write_u16(slot.delay);
    }
    Ok(())
}
