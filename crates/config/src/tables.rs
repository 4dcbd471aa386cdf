//! Opcode tables, one per config category.

use crate::field::{Field, Width};
use crate::format::Op;
use crate::value::Side;
use contentpack_common::Category;

type Table = (Vec<Op>, &'static [&'static str]);

pub(crate) fn ops(category: Category) -> Option<Table> {
    let ops = match category {
        Category::Flo => flo(),
        Category::Idk => idk(),
        Category::Seq => seq(),
        Category::SpotAnim => spotanim(),
        Category::Varp => varp(),
        Category::Loc => loc(),
        Category::Npc => npc(),
        Category::Obj => obj(),
        Category::Model | Category::Anim | Category::Texture => return None,
    };
    let required: &'static [&'static str] = match category {
        Category::Seq => &["frame1"],
        _ => &[],
    };
    Some((ops, required))
}

pub const IDK_TYPES: &[(&str, u8)] = &[
    ("man_hair", 0),
    ("man_jaw", 1),
    ("man_torso", 2),
    ("man_arms", 3),
    ("man_hands", 4),
    ("man_legs", 5),
    ("man_feet", 6),
    ("woman_hair", 7),
    ("woman_jaw", 8),
    ("woman_torso", 9),
    ("woman_arms", 10),
    ("woman_hands", 11),
    ("woman_legs", 12),
    ("woman_feet", 13),
];

pub const VARP_SCOPES: &[(&str, u8)] = &[("temp", 0), ("perm", 1)];

/// Script var types by their one-character type code.
pub const VARP_TYPES: &[(&str, u8)] = &[
    ("int", b'i'),
    ("boolean", b'1'),
    ("string", b's'),
    ("coord", b'c'),
    ("obj", b'o'),
    ("namedobj", b'O'),
    ("npc", b'n'),
    ("loc", b'l'),
    ("seq", b'A'),
    ("stat", b'S'),
    ("inv", b'v'),
    ("component", b'I'),
    ("enum", b'g'),
    ("struct", b'J'),
    ("spotanim", b't'),
    ("idk", b'K'),
    ("category", b'y'),
    ("interface", b'a'),
    ("synth", b'P'),
];

const OPS: [&str; 5] = ["op1", "op2", "op3", "op4", "op5"];
const IOPS: [&str; 5] = ["iop1", "iop2", "iop3", "iop4", "iop5"];
const HEADS: [&str; 10] = [
    "head1", "head2", "head3", "head4", "head5", "head6", "head7", "head8", "head9", "head10",
];
const COUNTS: [&str; 10] = [
    "count1", "count2", "count3", "count4", "count5", "count6", "count7", "count8", "count9",
    "count10",
];

fn text_ops<'a>(first: u8, keys: &'a [&'static str]) -> impl Iterator<Item = Op> + 'a {
    keys.iter()
        .zip(first..)
        .map(|(key, code)| Op::new(code, Field::Text(*key)))
}

/// Ten source halves at 40..=49 and ten dest halves at 50..=59.
fn recolour_halves() -> impl Iterator<Item = Op> {
    [(40, Side::Source), (50, Side::Dest)]
        .into_iter()
        .flat_map(|(base, side)| {
            (1..=10u8).map(move |slot| {
                Op::new(base + slot - 1, Field::RecolourHalf(slot, side))
                    .client()
                    .leading()
            })
        })
}

fn flo() -> Vec<Op> {
    vec![
        Op::new(1, Field::Colour("colour")).client(),
        Op::new(2, Field::Ref("texture", Category::Texture, Width::U8)).client(),
        Op::new(3, Field::Flag("overlay", true)).client(),
        Op::new(5, Field::Flag("occlude", false)).client(),
        Op::new(6, Field::Text("name")).leading(),
    ]
}

fn idk() -> Vec<Op> {
    let mut ops = vec![
        Op::new(1, Field::Enum("type", IDK_TYPES)),
        Op::new(2, Field::RefList("model", Category::Model))
            .client()
            .leading(),
        Op::new(3, Field::Flag("disable", true)),
    ];
    ops.extend(recolour_halves());
    ops.extend(
        HEADS
            .iter()
            .zip(60..)
            .map(|(key, code)| Op::new(code, Field::Ref(*key, Category::Model, Width::U16)).client()),
    );
    ops
}

fn seq() -> Vec<Op> {
    vec![
        Op::new(1, Field::Frames),
        Op::new(2, Field::Int("replayoff", Width::U16)),
        Op::new(3, Field::Labels("walkmerge")).client(),
        Op::new(4, Field::Flag("stretches", true)).client(),
        Op::new(5, Field::Int("priority", Width::U8)),
        Op::new(6, Field::Held("replaceheldright")).client(),
        Op::new(7, Field::Held("replaceheldleft")).client(),
        Op::new(8, Field::Int("maxloops", Width::U8)),
    ]
}

fn spotanim() -> Vec<Op> {
    let mut ops = vec![
        Op::new(1, Field::Ref("model", Category::Model, Width::U16))
            .client()
            .leading(),
        Op::new(2, Field::Ref("anim", Category::Seq, Width::U16)),
        Op::new(3, Field::Flag("hasalpha", true)).client(),
        Op::new(4, Field::Int("resizeh", Width::U16)).client(),
        Op::new(5, Field::Int("resizev", Width::U16)).client(),
        Op::new(6, Field::Int("rotation", Width::U16)).client(),
        Op::new(7, Field::Int("ambient", Width::U8)).client(),
        Op::new(8, Field::Int("contrast", Width::U8)).client(),
    ];
    ops.extend(recolour_halves());
    ops
}

fn varp() -> Vec<Op> {
    vec![
        Op::new(1, Field::Enum("scope", VARP_SCOPES)).server(),
        Op::new(2, Field::Enum("type", VARP_TYPES)).server(),
        Op::new(4, Field::Flag("protect", false)).server(),
        Op::new(5, Field::Int("clientcode", Width::U16)).client(),
        Op::new(6, Field::Flag("transmit", true)).server(),
    ]
}

fn loc() -> Vec<Op> {
    let mut ops = vec![
        Op::new(1, Field::LocModels).client().leading(),
        Op::new(2, Field::Text("name")).leading(),
        Op::new(3, Field::Text("desc")).leading(),
        Op::new(14, Field::Int("width", Width::U8)),
        Op::new(15, Field::Int("length", Width::U8)),
        Op::new(17, Field::Flag("blockwalk", false)),
        Op::new(18, Field::Flag("blockrange", false)),
        Op::new(19, Field::Bool("active")),
        Op::new(21, Field::Flag("hillskew", true)).client(),
        Op::new(22, Field::Flag("sharelight", true)).client(),
        Op::new(23, Field::Flag("occlude", true)).client(),
        Op::new(24, Field::Ref("anim", Category::Seq, Width::U16)).client(),
        Op::new(25, Field::Flag("hasalpha", true)).client(),
        Op::new(28, Field::Int("wallwidth", Width::U8)),
        Op::new(29, Field::Int("ambient", Width::I8)).client(),
        Op::new(39, Field::Int("contrast", Width::I8)).client(),
    ];
    ops.extend(text_ops(30, &OPS));
    ops.extend([
        Op::new(40, Field::Recolours).client().leading(),
        Op::new(60, Field::Int("mapfunction", Width::U16)).client(),
        Op::new(62, Field::Flag("mirror", true)).client(),
        Op::new(64, Field::Flag("shadow", false)).client(),
        Op::new(65, Field::Int("resizex", Width::U16)).client(),
        Op::new(66, Field::Int("resizey", Width::U16)).client(),
        Op::new(67, Field::Int("resizez", Width::U16)).client(),
        Op::new(68, Field::Int("mapscene", Width::U16)).client(),
        Op::new(69, Field::Int("forceapproach", Width::U8)),
        Op::new(70, Field::Int("xoff", Width::I16)).client(),
        Op::new(71, Field::Int("yoff", Width::I16)).client(),
        Op::new(72, Field::Int("zoff", Width::I16)).client(),
        Op::new(73, Field::Flag("forcedecor", true)),
    ]);
    ops
}

fn npc() -> Vec<Op> {
    let mut ops = vec![
        Op::new(1, Field::RefList("model", Category::Model))
            .client()
            .leading(),
        Op::new(2, Field::Text("name")).leading(),
        Op::new(3, Field::Text("desc")).leading(),
        Op::new(12, Field::Int("size", Width::U8)),
        Op::new(13, Field::Ref("readyanim", Category::Seq, Width::U16)),
        Op::new(14, Field::Ref("walkanim", Category::Seq, Width::U16)),
        Op::new(16, Field::Flag("hasalpha", true)).client(),
        Op::new(17, Field::WalkAnims("walkanim")),
    ];
    ops.extend(text_ops(30, &OPS));
    ops.extend([
        Op::new(40, Field::Recolours).client().leading(),
        Op::new(60, Field::RefList("head", Category::Model)).client(),
        Op::new(74, Field::Int("attack", Width::U16)).server(),
        Op::new(75, Field::Int("defence", Width::U16)).server(),
        Op::new(76, Field::Int("strength", Width::U16)).server(),
        Op::new(77, Field::Int("hitpoints", Width::U16)).server(),
        Op::new(78, Field::Int("ranged", Width::U16)).server(),
        Op::new(79, Field::Int("magic", Width::U16)).server(),
        Op::new(93, Field::Flag("minimap", false)).client(),
        Op::new(95, Field::Int("vislevel", Width::U16)),
        Op::new(97, Field::Int("resizeh", Width::U16)).client(),
        Op::new(98, Field::Int("resizev", Width::U16)).client(),
    ]);
    ops
}

fn obj() -> Vec<Op> {
    let model = |key| Field::Ref(key, Category::Model, Width::U16);
    let mut ops = vec![
        Op::new(1, model("model")).client().leading(),
        Op::new(2, Field::Text("name")).leading(),
        Op::new(3, Field::Text("desc")).leading(),
        Op::new(4, Field::Int("zoom2d", Width::U16)).client(),
        Op::new(5, Field::Int("xan2d", Width::U16)).client(),
        Op::new(6, Field::Int("yan2d", Width::U16)).client(),
        Op::new(7, Field::Int("xof2d", Width::I16)).client(),
        Op::new(8, Field::Int("yof2d", Width::I16)).client(),
        Op::new(9, Field::Flag("code9", true)).client(),
        Op::new(10, Field::Ref("code10", Category::Seq, Width::U16)).client(),
        Op::new(11, Field::Flag("stackable", true)),
        Op::new(12, Field::Int("cost", Width::I32)),
        Op::new(16, Field::Flag("members", true)),
        Op::new(23, Field::Wear("manwear")).client(),
        Op::new(24, model("manwear2")).client(),
        Op::new(25, Field::Wear("womanwear")).client(),
        Op::new(26, model("womanwear2")).client(),
    ];
    ops.extend(text_ops(30, &OPS));
    ops.extend(text_ops(35, &IOPS));
    ops.extend([
        Op::new(40, Field::Recolours).client().leading(),
        Op::new(78, model("manwear3")).client(),
        Op::new(79, model("womanwear3")).client(),
        Op::new(90, model("manhead")).client(),
        Op::new(91, model("womanhead")).client(),
        Op::new(92, model("manhead2")).client(),
        Op::new(93, model("womanhead2")).client(),
        Op::new(95, Field::Int("zan2d", Width::U16)).client(),
        Op::new(97, Field::Ref("certlink", Category::Obj, Width::U16)),
        Op::new(98, Field::Ref("certtemplate", Category::Obj, Width::U16)),
    ]);
    ops.extend(
        COUNTS
            .iter()
            .zip(100..)
            .map(|(key, code)| Op::new(code, Field::Count(*key))),
    );
    ops.extend([
        Op::new(200, Field::Flag("tradeable", true)).server(),
        Op::new(201, Field::Int("respawnrate", Width::U16)).server(),
    ]);
    ops
}
