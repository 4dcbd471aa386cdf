use contentpack_common::Category;
use std::fmt;

/// Shape used when a loc model line names no shape.
pub const DEFAULT_SHAPE: u8 = 10;

/// Loc model shapes by wire value.
pub const SHAPES: [&str; 23] = [
    "wall_straight",
    "wall_diagonalcorner",
    "wall_l",
    "wall_squarecorner",
    "walldecor_straight_nooffset",
    "walldecor_straight_offset",
    "walldecor_diagonal_offset",
    "walldecor_diagonal_nooffset",
    "walldecor_diagonal_both",
    "wall_diagonal",
    "centrepiece_straight",
    "centrepiece_diagonal",
    "roof_straight",
    "roof_diagonal_with_roofedge",
    "roof_diagonal",
    "roof_l_concave",
    "roof_l_convex",
    "roof_flat",
    "roofedge_straight",
    "roofedge_diagonalcorner",
    "roofedge_l",
    "roofedge_squarecorner",
    "grounddecor",
];

/// Which half of a recolour pair a property carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Source,
    Dest,
}

impl Side {
    pub fn suffix(self) -> char {
        match self {
            Side::Source => 's',
            Side::Dest => 'd',
        }
    }
}

/// A recolour half: either a raw 16-bit colour or a named texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Colour {
    Rgb(u16),
    Texture(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recolour {
    /// 1-based slot number from the key.
    pub slot: u8,
    pub side: Side,
    pub colour: Colour,
}

impl Recolour {
    /// Source key for this half: `recol<N><s|d>` or `retex<N><s|d>`.
    pub fn key(&self) -> String {
        let prefix = match self.colour {
            Colour::Rgb(_) => "recol",
            Colour::Texture(_) => "retex",
        };
        format!("{prefix}{}{}", self.slot, self.side.suffix())
    }

    /// Parse `recol3s` / `retex1d` into `(is_texture, slot, side)`.
    pub fn parse_key(key: &str) -> Option<(bool, u8, Side)> {
        let (texture, rest) = if let Some(rest) = key.strip_prefix("recol") {
            (false, rest)
        } else {
            (true, key.strip_prefix("retex")?)
        };
        let side = match rest.chars().last()? {
            's' => Side::Source,
            'd' => Side::Dest,
            _ => return None,
        };
        let slot: u8 = rest[..rest.len() - 1].parse().ok()?;
        (slot >= 1).then_some((texture, slot, side))
    }
}

/// A typed property value.
///
/// References hold the target debugname; ids are resolved against the
/// registries while encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Text(String),
    Ref { category: Category, name: String },
    /// `replaceheld*=hide`.
    Hide,
    Recolour(Recolour),
    LocModel { model: String, shape: u8 },
    /// Walk, turn-back, turn-left and turn-right sequences.
    WalkAnims([String; 4]),
    Wear { model: String, offset: i8 },
    Count { obj: String, amount: u16 },
    Labels(Vec<u8>),
}

impl Value {
    pub fn reference(category: Category, name: impl Into<String>) -> Self {
        Value::Ref {
            category,
            name: name.into(),
        }
    }

    /// Model debugname this value points at, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            Value::Ref {
                category: Category::Model,
                name,
            } => Some(name),
            Value::LocModel { model, .. } | Value::Wear { model, .. } => Some(model),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(true) => f.write_str("yes"),
            Value::Bool(false) => f.write_str("no"),
            Value::Text(text) => f.write_str(text),
            Value::Ref { name, .. } => f.write_str(name),
            Value::Hide => f.write_str("hide"),
            Value::Recolour(Recolour {
                colour: Colour::Rgb(rgb),
                ..
            }) => write!(f, "{rgb}"),
            Value::Recolour(Recolour {
                colour: Colour::Texture(name),
                ..
            }) => f.write_str(name),
            Value::LocModel { model, shape } if *shape == DEFAULT_SHAPE => f.write_str(model),
            Value::LocModel { model, shape } => match SHAPES.get(*shape as usize) {
                Some(shape) => write!(f, "{model},{shape}"),
                None => write!(f, "{model},{shape}"),
            },
            Value::WalkAnims(seqs) => f.write_str(&seqs.join(",")),
            Value::Wear { model, offset: 0 } => f.write_str(model),
            Value::Wear { model, offset } => write!(f, "{model},{offset}"),
            Value::Count { obj, amount } => write!(f, "{obj},{amount}"),
            Value::Labels(labels) => {
                let labels: Vec<String> = labels.iter().map(u8::to_string).collect();
                f.write_str(&labels.join(","))
            }
        }
    }
}

/// Parse a decimal or `0x` hexadecimal integer.
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None if digits.chars().all(|c| c.is_ascii_digit()) => digits.parse().ok()?,
        None => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse `yes` / `no`.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Parse a loc shape name or number.
pub fn parse_shape(text: &str) -> Option<u8> {
    let text = text.trim();
    SHAPES
        .iter()
        .position(|s| *s == text)
        .map(|i| i as u8)
        .or_else(|| text.parse().ok())
}
