//! End-to-end behavior of the asset database over real project trees.

use jasset_config::testing::TestEnvironment;
use jasset_db::meta::{read_sidecar, sidecar_path};
use jasset_db::{AssetDb, AssetMetaData, AssetRegistry, AssetSource, SourceMask, SourceState};
use jasset_hash::Uuid8;
use jasset_vfs::MonitorEvent;

fn open(env: &TestEnvironment) -> AssetDb {
    let mut db = AssetDb::new(&env.config(), AssetRegistry::with_defaults());
    db.initialize(SourceMask::ALL);
    db
}

#[test]
fn test_override_shadows_lower_sources() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("builtin/tex/hero.png", b"builtin").unwrap();
    env.create_file("assets/tex/hero.png", b"game").unwrap();
    env.create_file("override/tex/hero.png", b"override").unwrap();
    env.create_file("builtin/shaders/sprite.frag", b"frag").unwrap();

    let mut db = open(&env);
    for source in AssetSource::ALL {
        assert_eq!(db.state(source), SourceState::Ready);
    }

    let hero = db.find_asset("tex/hero.png");
    assert_eq!(hero.asset_source(), Some(AssetSource::Override));
    assert_eq!(db.read_asset(hero).unwrap(), b"override");

    let shader = db.find_asset("shaders/sprite.frag");
    assert_eq!(shader.asset_source(), Some(AssetSource::BuiltIn));
    assert_eq!(db.get_asset_by_uuid(shader).unwrap().type_name(), "shader");

    assert!(!db.find_asset("tex/missing.png").is_valid());
}

#[test]
fn test_sidecars_written_for_editable_sources_only() {
    let env = TestEnvironment::new().unwrap();
    let game_file = env.create_file("assets/snd/hit.wav", b"wav").unwrap();
    let builtin_file = env.create_file("builtin/snd/click.wav", b"wav").unwrap();

    let db = open(&env);
    let meta = read_sidecar(&game_file).expect("sidecar generated");
    assert_eq!(meta.uuid, Uuid8::from_path("snd/hit.wav"));
    assert_eq!(meta.type_name, "audio");
    assert!(!sidecar_path(&builtin_file).exists());

    // The sidecar itself never becomes an entry
    assert!(db.find_from_vfs("snd/hit.wav.meta", AssetSource::Game).is_none());
}

#[test]
fn test_authored_sidecar_identity_is_kept() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/tex/hero.png", b"png").unwrap();
    env.create_file(
        "assets/tex/hero.png.meta",
        br#"{"uuid": "DEADBEEF-00000001", "type": "texture"}"#,
    )
    .unwrap();

    let mut db = open(&env);
    let uuid: Uuid8 = "DEADBEEF-00000001".parse().unwrap();
    let asset = db.find_asset_by_uuid(uuid);
    assert!(asset.is_valid());
    assert_eq!(db.get_asset_by_uuid(asset).unwrap().path(), "tex/hero.png");
    assert_eq!(db.find_asset("tex/hero.png"), asset);
}

#[test]
fn test_malformed_and_duplicate_sidecars_regenerated() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/a.png", b"a").unwrap();
    env.create_file("assets/a.png.meta", br#"{"uuid": "00000000-0000ABCD"}"#).unwrap();
    let copy = env.create_file("assets/b.png", b"a").unwrap();
    env.create_file("assets/b.png.meta", br#"{"uuid": "00000000-0000ABCD"}"#).unwrap();
    let broken = env.create_file("assets/c.png", b"c").unwrap();
    env.create_file("assets/c.png.meta", b"{ garbage").unwrap();

    let _db = open(&env);

    let kept = read_sidecar(&env.project_root.join("assets/a.png")).unwrap();
    assert_eq!(kept.uuid, Uuid8::from_u64(0xABCD));

    let copied = read_sidecar(&copy).unwrap();
    assert_eq!(copied.uuid, Uuid8::from_path("b.png"));
    assert_ne!(copied.uuid, kept.uuid);

    let repaired = read_sidecar(&broken).unwrap();
    assert_eq!(repaired.uuid, Uuid8::from_path("c.png"));
    assert_eq!(repaired.flags & AssetMetaData::GENERATED, AssetMetaData::GENERATED);
}

#[test]
fn test_cache_roundtrip_between_sessions() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("builtin/fonts/mono.ttf", b"ttf").unwrap();
    env.create_file("builtin/ui/panel.png", b"png").unwrap();

    let db = open(&env);
    let count = db.save_to_asset_db(AssetSource::BuiltIn).unwrap();
    // fonts, fonts/mono.ttf, ui, ui/panel.png
    assert_eq!(count, 4);
    assert!(env.cache_dir.join("builtin.resdb").exists());

    let mut fresh = AssetDb::new(&env.config(), AssetRegistry::with_defaults());
    let restored = fresh.load_from_asset_db(AssetSource::BuiltIn).unwrap();
    assert_eq!(restored, 4);
    let vfs = fresh.source(AssetSource::BuiltIn).vfs();
    assert_eq!(vfs.entry_count(), 5);
    let id = vfs.index_of_file_entry("BuiltIn/ui/panel.png");
    assert_eq!(
        fresh.source(AssetSource::BuiltIn).meta(id).unwrap().type_name,
        "texture"
    );
}

#[test]
fn test_corrupt_cache_falls_back_to_scan() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/a.txt", b"a").unwrap();
    env.create_file(".jasset/cache/game.resdb", b"ASDB\x09\0\0\0trunc").unwrap();

    let mut db = open(&env);
    assert_eq!(db.state(AssetSource::Game), SourceState::Ready);
    assert!(db.find_asset("a.txt").is_valid());
}

#[test]
fn test_packed_source_serves_packaged_assets() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/tex/hero.png", b"hero-bytes").unwrap();
    env.create_file("assets/lvl/one.map", b"map-bytes").unwrap();
    let dist = env.create_dir("dist").unwrap();

    let mut db = open(&env);
    let original = db.find_asset("tex/hero.png");
    let original_uuid = db.get_asset_by_uuid(original).unwrap().uuid();
    assert_eq!(db.pack_assets(AssetSource::Game.mask(), &dist), 2);
    assert!(dist.join("game.jpak").exists());
    assert!(dist.join("game.resdb").exists());

    let mut config = env.config();
    config.sources.game.root = dist.clone();
    config.sources.game.packed = true;
    let mut shipped = AssetDb::new(&config, AssetRegistry::with_defaults());
    assert_eq!(shipped.initialize(AssetSource::Game.mask()), 1);

    let hero = shipped.find_asset("tex/hero.png");
    assert_eq!(hero.asset_source(), Some(AssetSource::Game));
    assert_eq!(shipped.read_asset(hero).unwrap(), b"hero-bytes");
    assert_eq!(shipped.get_asset_by_uuid(hero).unwrap().uuid(), original_uuid);

    let map = shipped.find_asset("lvl/one.map");
    assert_eq!(shipped.read_asset(map).unwrap(), b"map-bytes");

    // Packed sources ignore rescans
    assert_eq!(shipped.build_vfs(AssetSource::Game.mask()), 0);
}

#[test]
fn test_packed_source_without_cache_indexes_package() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/data/a.json", b"{}").unwrap();
    let dist = env.create_dir("dist").unwrap();

    let mut db = open(&env);
    assert_eq!(db.pack_assets(AssetSource::Game.mask(), &dist), 1);
    std::fs::remove_file(dist.join("game.resdb")).unwrap();

    let mut config = env.config();
    config.sources.game.root = dist;
    config.sources.game.packed = true;
    let mut shipped = AssetDb::new(&config, AssetRegistry::with_defaults());
    shipped.initialize(AssetSource::Game.mask());

    let asset = shipped.find_asset("data/a.json");
    assert_eq!(shipped.read_asset(asset).unwrap(), b"{}");
}

#[test]
fn test_missing_package_leaves_source_uninitialized() {
    let env = TestEnvironment::new().unwrap();
    let mut config = env.config();
    config.sources.runtime.packed = true;
    let mut db = AssetDb::new(&config, AssetRegistry::with_defaults());
    assert_eq!(db.initialize(AssetSource::Runtime.mask()), 0);
    assert_eq!(db.state(AssetSource::Runtime), SourceState::Uninitialized);
}

#[test]
fn test_events_update_assets() {
    let env = TestEnvironment::new().unwrap();
    let mut db = open(&env);

    let file = env.create_file("assets/live/new.png", b"png").unwrap();
    let changed = db.apply_events(
        AssetSource::Game,
        &[MonitorEvent::FileChanged { path: file.clone() }],
    );
    assert_eq!(changed, 2);
    let asset = db.find_asset("live/new.png");
    assert!(asset.is_valid());
    assert!(sidecar_path(&file).exists());

    env.remove("assets/live").unwrap();
    db.apply_events(
        AssetSource::Game,
        &[MonitorEvent::Removed {
            path: env.project_root.join("assets/live"),
        }],
    );
    assert!(db.get_asset_by_uuid(asset).is_none());
    assert!(!db.find_asset("live/new.png").is_valid());
}

#[test]
fn test_rebuild_drops_deleted_assets() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/a.txt", b"a").unwrap();
    env.create_file("assets/b.txt", b"b").unwrap();
    let mut db = open(&env);

    let a = db.find_asset("a.txt");
    let b = db.find_asset("b.txt");
    env.remove("assets/a.txt").unwrap();
    env.create_file("assets/c.txt", b"c").unwrap();

    assert_eq!(db.build_vfs(AssetSource::Game.mask()), 2);
    assert!(db.get_asset_by_uuid(a).is_none());
    assert!(db.get_asset_by_uuid(b).is_some());
}

#[test]
fn test_packaging_needs_editor() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/a.txt", b"a").unwrap();
    let dist = env.create_dir("dist").unwrap();

    let mut config = env.config();
    config.project.editor = false;
    let mut db = AssetDb::new(&config, AssetRegistry::with_defaults());
    db.initialize(SourceMask::ALL);

    assert!(!sidecar_path(&env.project_root.join("assets/a.txt")).exists());
    assert_eq!(db.pack_assets(SourceMask::ALL, &dist), u32::MAX);
}

#[test]
fn test_released_ref_never_resolves_to_reused_slot() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/a.txt", b"a").unwrap();
    let mut db = open(&env);

    let a = db.find_asset("a.txt");
    assert!(db.release_asset(a));

    env.create_file("assets/z.txt", b"z").unwrap();
    db.build_vfs(AssetSource::Game.mask());
    let z = db.find_asset("z.txt");

    // Same slot, new generation
    assert_eq!(z.raw(), a.raw());
    assert_ne!(z, a);
    assert!(db.get_asset_by_uuid(a).is_none());
    assert!(!db.release_asset(a));
    assert_eq!(db.get_asset_by_uuid(z).unwrap().path(), "z.txt");
    assert_eq!(db.source(AssetSource::Game).asset_count(), 1);
}

#[test]
fn test_pruned_ref_never_resolves_to_reused_slot() {
    let env = TestEnvironment::new().unwrap();
    env.create_file("assets/a.txt", b"a").unwrap();
    let mut db = open(&env);

    let a = db.find_asset("a.txt");
    env.remove("assets/a.txt").unwrap();
    env.create_file("assets/b.txt", b"b").unwrap();
    db.build_vfs(AssetSource::Game.mask());

    let b = db.find_asset("b.txt");
    assert!(b.is_valid());
    assert!(db.get_asset_by_uuid(a).is_none());
    assert_eq!(db.read_asset(b).unwrap(), b"b");
    assert!(db.read_asset(a).is_err());
}

#[test]
fn test_cache_records_cannot_escape_root() {
    use jasset_vfs::cache::save_cache;
    use jasset_vfs::{CacheRecord, EntryType};

    let env = TestEnvironment::new().unwrap();
    let record = |path: &str| CacheRecord::<AssetMetaData> {
        path: path.to_string(),
        kind: EntryType::File,
        pak_index: -1,
        position: 0,
        meta: None,
    };
    let records = vec![record("ok.txt"), record("../secret.txt"), record("a/../../b.txt")];
    save_cache(&env.cache_dir.join("game.resdb"), &records).unwrap();

    let mut db = AssetDb::new(&env.config(), AssetRegistry::with_defaults());
    assert_eq!(db.load_from_asset_db(AssetSource::Game).unwrap(), 1);
    assert!(db.find_asset("ok.txt").is_valid());
    assert!(!db.find_asset("../secret.txt").is_valid());
}
