use crate::error::ModelError;
use contentpack_buffer::Reader;

/// Size of the fixed trailer at the end of every model blob.
pub const TRAILER_LEN: usize = 18;

/// Trailer priority value meaning "one priority byte per face".
pub const PER_FACE_PRIORITY: u8 = 255;

/// Where the per-face priorities come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityLayout {
    /// One byte per face at this offset.
    PerFace(usize),
    /// Every face shares this priority; no bytes are stored.
    Constant(u8),
}

/// Byte offsets of every section of a model blob, derived from its trailer.
///
/// Optional per-face or per-vertex arrays are `None` when the trailer marks
/// them absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    pub vertex_count: usize,
    pub face_count: usize,
    pub textured_face_count: usize,
    pub vertex_flags: usize,
    pub face_orientations: usize,
    pub face_priorities: PriorityLayout,
    pub face_labels: Option<usize>,
    pub face_infos: Option<usize>,
    pub vertex_labels: Option<usize>,
    pub face_alphas: Option<usize>,
    pub face_vertices: usize,
    pub face_colours: usize,
    pub texture_axes: usize,
    pub vertex_x: usize,
    pub vertex_y: usize,
    pub vertex_z: usize,
    /// One past the last section byte.
    pub end: usize,
}

impl ModelMetadata {
    /// Parse the trailer of `data` and lay out the section offsets.
    pub fn parse(data: &[u8]) -> Result<Self, ModelError> {
        if data.len() < TRAILER_LEN {
            return Err(ModelError::MissingTrailer {
                len: data.len(),
                trailer: TRAILER_LEN,
            });
        }
        let body_len = data.len() - TRAILER_LEN;
        let mut trailer = Reader::at(data, body_len);
        let vertex_count = trailer.read_u16()? as usize;
        let face_count = trailer.read_u16()? as usize;
        let textured_face_count = trailer.read_u8()? as usize;
        let has_infos = trailer.read_bool()?;
        let priority = trailer.read_u8()?;
        let has_alphas = trailer.read_bool()?;
        let has_face_labels = trailer.read_bool()?;
        let has_vertex_labels = trailer.read_bool()?;
        let x_len = trailer.read_u16()? as usize;
        let y_len = trailer.read_u16()? as usize;
        let z_len = trailer.read_u16()? as usize;
        let face_vertices_len = trailer.read_u16()? as usize;

        let mut offset = 0;
        let mut take = |len: usize| {
            let at = offset;
            offset += len;
            at
        };

        let vertex_flags = take(vertex_count);
        let face_orientations = take(face_count);
        let face_priorities = if priority == PER_FACE_PRIORITY {
            PriorityLayout::PerFace(take(face_count))
        } else {
            PriorityLayout::Constant(priority)
        };
        let face_labels = has_face_labels.then(|| take(face_count));
        let face_infos = has_infos.then(|| take(face_count));
        let vertex_labels = has_vertex_labels.then(|| take(vertex_count));
        let face_alphas = has_alphas.then(|| take(face_count));
        let face_vertices = take(face_vertices_len);
        let face_colours = take(face_count * 2);
        let texture_axes = take(textured_face_count * 6);
        let vertex_x = take(x_len);
        let vertex_y = take(y_len);
        let vertex_z = take(z_len);
        let end = offset;

        if end > body_len {
            return Err(ModelError::SectionOverflow {
                need: end,
                have: body_len,
            });
        }

        Ok(Self {
            vertex_count,
            face_count,
            textured_face_count,
            vertex_flags,
            face_orientations,
            face_priorities,
            face_labels,
            face_infos,
            vertex_labels,
            face_alphas,
            face_vertices,
            face_colours,
            texture_axes,
            vertex_x,
            vertex_y,
            vertex_z,
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trailer bytes: counts, then has-info, priority, has-alpha,
    /// has-face-labels, has-vertex-labels, then the four stream lengths.
    fn trailer(vertices: u16, faces: u16, flags: [u8; 5], lens: [u16; 4]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&vertices.to_be_bytes());
        out.extend_from_slice(&faces.to_be_bytes());
        out.push(0);
        out.extend_from_slice(&flags);
        for len in lens {
            out.extend_from_slice(&len.to_be_bytes());
        }
        out
    }

    #[test]
    fn too_short_for_trailer() {
        assert!(matches!(
            ModelMetadata::parse(&[0; 10]),
            Err(ModelError::MissingTrailer { len: 10, .. })
        ));
    }

    #[test]
    fn absent_sections_have_no_offset() {
        // 2 vertices, 1 face, constant priority 3, no optional arrays.
        let body = vec![0u8; 2 + 1 + 3 + 2];
        let mut data = body.clone();
        data.extend(trailer(2, 1, [0, 3, 0, 0, 0], [0, 0, 0, 3]));
        assert_eq!(data.len(), body.len() + TRAILER_LEN);

        let meta = ModelMetadata::parse(&data).unwrap();
        assert_eq!(meta.vertex_flags, 0);
        assert_eq!(meta.face_orientations, 2);
        assert_eq!(meta.face_priorities, PriorityLayout::Constant(3));
        assert_eq!(meta.face_labels, None);
        assert_eq!(meta.face_infos, None);
        assert_eq!(meta.vertex_labels, None);
        assert_eq!(meta.face_alphas, None);
        assert_eq!(meta.face_vertices, 3);
        assert_eq!(meta.face_colours, 6);
        assert_eq!(meta.end, 8);
    }

    #[test]
    fn per_face_sections_advance_offsets() {
        // 1 vertex, 2 faces, every optional array present.
        let body_len = 1 + 2 + 2 + 2 + 2 + 1 + 2 + 0 + 4;
        let mut data = vec![0u8; body_len];
        data.extend(trailer(1, 2, [1, 255, 1, 1, 1], [0, 0, 0, 0]));

        let meta = ModelMetadata::parse(&data).unwrap();
        assert_eq!(meta.face_priorities, PriorityLayout::PerFace(3));
        assert_eq!(meta.face_labels, Some(5));
        assert_eq!(meta.face_infos, Some(7));
        assert_eq!(meta.vertex_labels, Some(9));
        assert_eq!(meta.face_alphas, Some(10));
        assert_eq!(meta.face_vertices, 12);
        assert_eq!(meta.face_colours, 12);
        assert_eq!(meta.end, body_len);
    }

    #[test]
    fn sections_longer_than_body_rejected() {
        let mut data = vec![0u8; 2];
        data.extend(trailer(4, 4, [0, 0, 0, 0, 0], [0, 0, 0, 0]));
        assert!(matches!(
            ModelMetadata::parse(&data),
            Err(ModelError::SectionOverflow { .. })
        ));
    }
}
