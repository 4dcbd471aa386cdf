//! Pack sources, unpack the archives, repack the decoded text.

use contentpack_build::{BuildConfig, Builder, Layout, UnpackOptions};
use contentpack_common::Category;
use contentpack_config::Archive;
use contentpack_model::Model;
use std::path::Path;

const SOURCES: &[(&str, &str)] = &[
    (
        "items/weapons.obj",
        "\
[bronze_sword]
name=Bronze sword
model=sword_model
desc=A bronze sword.
cost=26
op2=Wield
recol1s=61
recol1d=5652
manwear=sword_model,6
count1=bronze_sword,2
tradeable=yes

[bronze_sword_cert]
certlink=bronze_sword
stackable=yes
",
    ),
    (
        "anims/walk.seq",
        "\
[human_walk]
frame1=walk_1
frame2=walk_2
delay2=4
replaceheldright=bronze_sword
",
    ),
    (
        "npcs/guards.npc",
        "\
[guard]
name=Guard
model1=sword_model
walkanim=human_walk,human_walk,human_walk,human_walk
readyanim=human_walk
attack=20
op2=Attack
",
    ),
    (
        "scenery/rocks.loc",
        "\
[rocks]
name=Rocks
model=rock_model,centrepiece_straight
width=2
anim=human_walk
op1=Mine
",
    ),
];

fn write(path: &Path, contents: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn mesh(colour: u16) -> Vec<u8> {
    Model {
        vertex_x: vec![0, 64, 0],
        vertex_y: vec![0, 0, 64],
        vertex_z: vec![0, 0, 0],
        face_a: vec![0],
        face_b: vec![1],
        face_c: vec![2],
        face_colours: vec![colour],
        ..Model::default()
    }
    .encode()
    .unwrap()
}

fn project(root: &Path) -> BuildConfig {
    let config = BuildConfig {
        layout: Layout::default().resolve(root),
        force: true,
        ..BuildConfig::default()
    };
    for (file, text) in SOURCES {
        write(&config.layout.scripts.join(file), text.as_bytes());
    }
    for model in ["sword_model", "rock_model"] {
        write(&config.layout.models.join(format!("{model}.ob2")), &mesh(61));
    }
    for anim in ["walk_1", "walk_2"] {
        write(&config.layout.anims.join(format!("{anim}.frame")), b"");
    }
    config
}

fn copy_archives(layout: &Layout, category: Category, to: &Path) {
    for (dir, sub) in [(&layout.client, "client"), (&layout.server, "server")] {
        for path in [Archive::dat_path(dir, category), Archive::idx_path(dir, category)] {
            let target = to.join(sub).join(path.file_name().unwrap());
            write(&target, &std::fs::read(&path).unwrap());
        }
    }
}

#[test]
fn pack_unpack_repack_is_byte_identical() {
    let first = tempfile::tempdir().unwrap();
    let config = project(first.path());
    let layout = config.layout.clone();
    let mut builder = Builder::new(config).unwrap().with_implementation(None);
    let summary = builder.pack_all().unwrap();
    assert_eq!(summary.packed.len(), Category::CONFIGS.len());

    // decode into a second project that shares only the registries
    let second = tempfile::tempdir().unwrap();
    let mut config2 = BuildConfig {
        layout: Layout::default().resolve(second.path()),
        force: true,
        ..BuildConfig::default()
    };
    config2.layout.pack = layout.pack.clone();
    config2.layout.models = layout.models.clone();
    config2.layout.anims = layout.anims.clone();
    let layout2 = config2.layout.clone();

    let categories = [Category::Obj, Category::Seq, Category::Npc, Category::Loc];
    let mut unpacker = Builder::new(config2.clone()).unwrap();
    for category in categories {
        copy_archives(&layout, category, &layout2.unpack);
        let output = layout2
            .scripts
            .join(format!("{}.{}", category.name(), category.extension()));
        let report = unpacker
            .unpack(
                category,
                &UnpackOptions {
                    output: Some(output),
                    ..UnpackOptions::default()
                },
            )
            .unwrap();
        assert_eq!(report.reviews, 0);
    }

    let obj_text =
        std::fs::read_to_string(layout2.scripts.join("obj.obj")).unwrap();
    assert!(obj_text.starts_with("[bronze_sword]\nmodel=sword_model\nname=Bronze sword\ndesc=A bronze sword.\n"));
    assert!(obj_text.contains("tradeable=yes\n"));

    let mut repacker = Builder::new(config2).unwrap().with_implementation(None);
    for category in categories {
        repacker.pack(category).unwrap();
        for (a, b) in [(&layout.client, &layout2.client), (&layout.server, &layout2.server)] {
            assert_eq!(
                std::fs::read(Archive::dat_path(a, category)).unwrap(),
                std::fs::read(Archive::dat_path(b, category)).unwrap(),
                "{category} differs after repack"
            );
        }
    }
    repacker.validate(Category::Obj).unwrap();
}

#[test]
fn comparison_against_packed_output_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());
    let layout = config.layout.clone();
    let mut builder = Builder::new(config).unwrap();
    builder.pack(Category::Obj).unwrap();
    copy_archives(&layout, Category::Obj, &layout.unpack);

    let report = builder
        .unpack(
            Category::Obj,
            &UnpackOptions {
                compare: true,
                ..UnpackOptions::default()
            },
        )
        .unwrap();
    assert_eq!(report.records, 2);
    assert_eq!(report.reviews, 0);
    assert_eq!(report.appended, 0);
    assert!(report.output.ends_with("obj.obj"));
}
