use crate::error::ModelError;
use crate::metadata::{ModelMetadata, PER_FACE_PRIORITY, PriorityLayout};
use contentpack_buffer::{Reader, Writer};

/// Face info bit marking the face colour as a texture id.
pub const FACE_TEXTURED: u8 = 0x2;

/// Face alpha at which a face is fully transparent.
pub const FACE_INVISIBLE: u8 = 255;

const FLAG_X: u8 = 0x1;
const FLAG_Y: u8 = 0x2;
const FLAG_Z: u8 = 0x4;

/// Per-face draw priorities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacePriorities {
    PerFace(Vec<u8>),
    Constant(u8),
}

impl FacePriorities {
    pub fn get(&self, face: usize) -> u8 {
        match self {
            Self::PerFace(values) => values.get(face).copied().unwrap_or(0),
            Self::Constant(value) => *value,
        }
    }
}

/// A fully decoded mesh.
///
/// Vertex coordinates are absolute. Face vertex indices are stored as
/// three parallel arrays, one per triangle corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub vertex_x: Vec<i32>,
    pub vertex_y: Vec<i32>,
    pub vertex_z: Vec<i32>,
    pub vertex_labels: Option<Vec<u8>>,
    pub face_a: Vec<i32>,
    pub face_b: Vec<i32>,
    pub face_c: Vec<i32>,
    pub face_colours: Vec<u16>,
    pub face_infos: Option<Vec<u8>>,
    pub face_priorities: FacePriorities,
    pub face_alphas: Option<Vec<u8>>,
    pub face_labels: Option<Vec<u8>>,
    /// `(p, m, n)` texture-space axis vertices per textured face.
    pub texture_axes: Vec<[u16; 3]>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            vertex_x: Vec::new(),
            vertex_y: Vec::new(),
            vertex_z: Vec::new(),
            vertex_labels: None,
            face_a: Vec::new(),
            face_b: Vec::new(),
            face_c: Vec::new(),
            face_colours: Vec::new(),
            face_infos: None,
            face_priorities: FacePriorities::Constant(0),
            face_alphas: None,
            face_labels: None,
            texture_axes: Vec::new(),
        }
    }
}

impl Model {
    pub fn vertex_count(&self) -> usize {
        self.vertex_x.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_a.len()
    }

    /// Decode a complete model blob.
    pub fn decode(data: &[u8]) -> Result<Self, ModelError> {
        let meta = ModelMetadata::parse(data)?;
        let vertex_count = meta.vertex_count;
        let face_count = meta.face_count;

        let mut flags = Reader::at(data, meta.vertex_flags);
        let mut xs = Reader::at(data, meta.vertex_x);
        let mut ys = Reader::at(data, meta.vertex_y);
        let mut zs = Reader::at(data, meta.vertex_z);
        let (mut x, mut y, mut z) = (0i32, 0i32, 0i32);
        let mut vertex_x = Vec::with_capacity(vertex_count);
        let mut vertex_y = Vec::with_capacity(vertex_count);
        let mut vertex_z = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let flag = flags.read_u8()?;
            if flag & FLAG_X != 0 {
                x += xs.read_smart_signed()?;
            }
            if flag & FLAG_Y != 0 {
                y += ys.read_smart_signed()?;
            }
            if flag & FLAG_Z != 0 {
                z += zs.read_smart_signed()?;
            }
            vertex_x.push(x);
            vertex_y.push(y);
            vertex_z.push(z);
        }

        let mut orientations = Reader::at(data, meta.face_orientations);
        let mut deltas = Reader::at(data, meta.face_vertices);
        let mut face_a = Vec::with_capacity(face_count);
        let mut face_b = Vec::with_capacity(face_count);
        let mut face_c = Vec::with_capacity(face_count);
        let (mut a, mut b, mut c, mut last) = (0i32, 0i32, 0i32, 0i32);
        for _ in 0..face_count {
            match orientations.read_u8()? {
                1 => {
                    a = deltas.read_smart_signed()? + last;
                    last = a;
                    b = deltas.read_smart_signed()? + last;
                    last = b;
                    c = deltas.read_smart_signed()? + last;
                    last = c;
                }
                2 => {
                    b = c;
                    c = deltas.read_smart_signed()? + last;
                    last = c;
                }
                3 => {
                    a = c;
                    c = deltas.read_smart_signed()? + last;
                    last = c;
                }
                4 => {
                    std::mem::swap(&mut a, &mut b);
                    c = deltas.read_smart_signed()? + last;
                    last = c;
                }
                // Unknown orientations repeat the previous triangle.
                _ => {}
            }
            face_a.push(a);
            face_b.push(b);
            face_c.push(c);
        }

        let mut colours = Reader::at(data, meta.face_colours);
        let face_colours = (0..face_count)
            .map(|_| colours.read_u16())
            .collect::<Result<Vec<_>, _>>()?;

        let mut axes = Reader::at(data, meta.texture_axes);
        let texture_axes = (0..meta.textured_face_count)
            .map(|_| Ok([axes.read_u16()?, axes.read_u16()?, axes.read_u16()?]))
            .collect::<Result<Vec<_>, ModelError>>()?;

        let face_priorities = match meta.face_priorities {
            PriorityLayout::PerFace(at) => FacePriorities::PerFace(bytes(data, at, face_count)?),
            PriorityLayout::Constant(value) => FacePriorities::Constant(value),
        };

        Ok(Self {
            vertex_labels: optional(data, meta.vertex_labels, vertex_count)?,
            face_infos: optional(data, meta.face_infos, face_count)?,
            face_alphas: optional(data, meta.face_alphas, face_count)?,
            face_labels: optional(data, meta.face_labels, face_count)?,
            vertex_x,
            vertex_y,
            vertex_z,
            face_a,
            face_b,
            face_c,
            face_colours,
            face_priorities,
            texture_axes,
        })
    }

    /// Encode into the trailer-terminated blob layout read by [`Model::decode`].
    pub fn encode(&self) -> Result<Vec<u8>, ModelError> {
        let vertex_count = self.vertex_count();
        let face_count = self.face_count();
        let vertex_count_u16 = limit(vertex_count, "vertices")?;
        let face_count_u16 = limit(face_count, "faces")?;
        let textured = u8::try_from(self.texture_axes.len()).map_err(|_| ModelError::TooLarge {
            what: "textured faces",
            count: self.texture_axes.len(),
        })?;

        let mut flags = Writer::with_capacity(vertex_count);
        let mut xs = Writer::new();
        let mut ys = Writer::new();
        let mut zs = Writer::new();
        let (mut px, mut py, mut pz) = (0, 0, 0);
        for v in 0..vertex_count {
            let (x, y, z) = (self.vertex_x[v], self.vertex_y[v], self.vertex_z[v]);
            let mut flag = 0;
            if x != px {
                flag |= FLAG_X;
                xs.write_smart_signed(x - px)?;
            }
            if y != py {
                flag |= FLAG_Y;
                ys.write_smart_signed(y - py)?;
            }
            if z != pz {
                flag |= FLAG_Z;
                zs.write_smart_signed(z - pz)?;
            }
            flags.write_u8(flag);
            (px, py, pz) = (x, y, z);
        }

        let mut orientations = Writer::with_capacity(face_count);
        let mut deltas = Writer::new();
        let (mut pa, mut pb, mut pc, mut last) = (0, 0, 0, 0);
        for f in 0..face_count {
            let (a, b, c) = (self.face_a[f], self.face_b[f], self.face_c[f]);
            let orientation = if a == pa && b == pc {
                2
            } else if a == pc && b == pb {
                3
            } else if a == pb && b == pa {
                4
            } else {
                1
            };
            orientations.write_u8(orientation);
            if orientation == 1 {
                deltas.write_smart_signed(a - last)?;
                deltas.write_smart_signed(b - a)?;
                last = b;
            }
            deltas.write_smart_signed(c - last)?;
            last = c;
            (pa, pb, pc) = (a, b, c);
        }

        // A constant of 255 collides with the per-face marker.
        let priorities = match &self.face_priorities {
            FacePriorities::Constant(value) if *value == PER_FACE_PRIORITY => {
                Some(vec![PER_FACE_PRIORITY; face_count])
            }
            FacePriorities::Constant(_) => None,
            FacePriorities::PerFace(values) => Some(values.clone()),
        };

        let mut out = Writer::new();
        out.write_bytes(flags.as_bytes());
        out.write_bytes(orientations.as_bytes());
        if let Some(priorities) = &priorities {
            out.write_bytes(sized(priorities, face_count, "priorities")?);
        }
        for (array, len, what) in [
            (&self.face_labels, face_count, "face labels"),
            (&self.face_infos, face_count, "face infos"),
            (&self.vertex_labels, vertex_count, "vertex labels"),
            (&self.face_alphas, face_count, "face alphas"),
        ] {
            if let Some(array) = array {
                out.write_bytes(sized(array, len, what)?);
            }
        }
        out.write_bytes(deltas.as_bytes());
        for colour in &self.face_colours {
            out.write_u16(*colour);
        }
        for [p, m, n] in &self.texture_axes {
            out.write_u16(*p);
            out.write_u16(*m);
            out.write_u16(*n);
        }
        out.write_bytes(xs.as_bytes());
        out.write_bytes(ys.as_bytes());
        out.write_bytes(zs.as_bytes());

        out.write_u16(vertex_count_u16);
        out.write_u16(face_count_u16);
        out.write_u8(textured);
        out.write_bool(self.face_infos.is_some());
        out.write_u8(match (&self.face_priorities, &priorities) {
            (FacePriorities::Constant(value), None) => *value,
            _ => PER_FACE_PRIORITY,
        });
        out.write_bool(self.face_alphas.is_some());
        out.write_bool(self.face_labels.is_some());
        out.write_bool(self.vertex_labels.is_some());
        out.write_u16(limit(xs.position(), "x delta bytes")?);
        out.write_u16(limit(ys.position(), "y delta bytes")?);
        out.write_u16(limit(zs.position(), "z delta bytes")?);
        out.write_u16(limit(deltas.position(), "face delta bytes")?);
        Ok(out.into_bytes())
    }

    /// Whether texture `texture_id` is drawn on at least one visible face.
    pub fn has_texture(&self, texture_id: u16) -> bool {
        let Some(infos) = &self.face_infos else {
            return false;
        };
        self.face_colours
            .iter()
            .zip(infos)
            .enumerate()
            .any(|(face, (&colour, &info))| {
                let visible = self
                    .face_alphas
                    .as_ref()
                    .and_then(|alphas| alphas.get(face))
                    .is_none_or(|&alpha| alpha != FACE_INVISIBLE);
                info & FACE_TEXTURED != 0 && colour == texture_id && visible
            })
    }
}

fn bytes(data: &[u8], at: usize, len: usize) -> Result<Vec<u8>, ModelError> {
    Ok(Reader::at(data, at).read_bytes(len)?.to_vec())
}

fn optional(data: &[u8], at: Option<usize>, len: usize) -> Result<Option<Vec<u8>>, ModelError> {
    at.map(|at| bytes(data, at, len)).transpose()
}

fn limit(count: usize, what: &'static str) -> Result<u16, ModelError> {
    u16::try_from(count).map_err(|_| ModelError::TooLarge { what, count })
}

fn sized<'a>(array: &'a [u8], len: usize, what: &'static str) -> Result<&'a [u8], ModelError> {
    if array.len() != len {
        return Err(ModelError::TooLarge {
            what,
            count: array.len(),
        });
    }
    Ok(array)
}
