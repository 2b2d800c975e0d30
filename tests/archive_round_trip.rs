//! Filesystem round-trip tests against the public `Archive` API.

use octree_archive::attribute::{registry, AttributeValue};
use octree_archive::{Archive, ArchiveOptions, AttributeBuffer, Bounds};
use octree_archive::node::{Node, NodeKind, ROOT_NAME};
use tempfile::tempdir;

/// Small deterministic LCG so test data doesn't depend on the system RNG.
struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn position_buffer(values: Vec<i32>) -> AttributeBuffer {
    AttributeBuffer {
        descriptor: registry::position(),
        values: AttributeValue::Int32(values),
    }
}

#[test]
fn s2_nine_node_archive_round_trips_positions() {
    init_logging();
    let dir = tempdir().unwrap();
    let mut archive = Archive::new(
        dir.path(),
        vec![registry::position()],
        Bounds::new([0.0, 0.0, 0.0], [1000.0, 1000.0, 1000.0]),
        ArchiveOptions::default(),
    )
    .unwrap();

    let mut rng = Lcg(42);
    let mut root = Node::new(ROOT_NAME, NodeKind::Normal);
    root.attr_start = 0;
    root.attr_end = 1;
    archive.set_node(root, Vec::new());

    let mut expected = Vec::new();
    for digit in 0u8..8 {
        let name = format!("r{digit}");
        let mut child = Node::new(name.clone(), NodeKind::Leaf);
        child.parent = Some(ROOT_NAME.to_string());
        child.attr_start = 0;
        child.attr_end = 1;
        child.num_points = 100;

        let mut values = Vec::with_capacity(300);
        for _ in 0..100 {
            values.push((rng.next_u32() % 1000) as i32);
            values.push((rng.next_u32() % 1000) as i32);
            values.push((rng.next_u32() % 1000) as i32);
        }
        expected.push((name.clone(), values.clone()));
        archive.set_node(child, vec![position_buffer(values)]);
    }

    archive.save().unwrap();
    let loaded = Archive::load(dir.path()).unwrap();
    assert_eq!(loaded.tree.len(), 9);

    for (name, values) in expected {
        let node = loaded.tree.get(&name).unwrap();
        assert_eq!(node.num_points, 100);
        let buffers = &loaded.node_buffers[&name];
        let AttributeValue::Int32(got) = &buffers[0].values else {
            panic!("expected Int32 positions");
        };
        assert_eq!(got, &values);
    }
}

#[test]
fn s3_depth_two_full_octree_yields_one_chunk_of_1606_bytes() {
    init_logging();
    let dir = tempdir().unwrap();
    let mut archive = Archive::new(
        dir.path(),
        vec![registry::position()],
        Bounds::default(),
        ArchiveOptions::default(),
    )
    .unwrap();

    let mut root = Node::new(ROOT_NAME, NodeKind::Normal);
    root.attr_start = 0;
    root.attr_end = 1;
    archive.set_node(root, Vec::new());

    for d1 in 0u8..8 {
        let l1 = format!("r{d1}");
        let mut n1 = Node::new(l1.clone(), NodeKind::Normal);
        n1.parent = Some(ROOT_NAME.to_string());
        n1.attr_start = 0;
        n1.attr_end = 1;
        archive.set_node(n1, Vec::new());

        for d2 in 0u8..8 {
            let l2 = format!("{l1}{d2}");
            let mut n2 = Node::new(l2.clone(), NodeKind::Leaf);
            n2.parent = Some(l1.clone());
            n2.attr_start = 0;
            n2.attr_end = 1;
            n2.num_points = 1;
            archive.set_node(n2, vec![position_buffer(vec![1, 2, 3])]);
        }
    }

    assert_eq!(archive.tree.len(), 73);
    archive.save().unwrap();

    let first_chunk_size = archive.metadata.hierarchy.unwrap().first_chunk_size;
    assert_eq!(first_chunk_size, 1606);

    let hierarchy_len = std::fs::metadata(dir.path().join("hierarchy.bin"))
        .unwrap()
        .len();
    assert_eq!(hierarchy_len, 1606);

    let loaded = Archive::load(dir.path()).unwrap();
    assert_eq!(loaded.tree.len(), 73);
}

#[test]
fn s5_brotli_grid_round_trips_shifted_by_packtime_minimum() {
    init_logging();
    let dir = tempdir().unwrap();
    let min = [100i32, 200, 300];
    let options = ArchiveOptions {
        brotli: true,
        ..ArchiveOptions::default()
    };
    let mut archive = Archive::new(
        dir.path(),
        vec![registry::position()],
        Bounds::default(),
        options,
    )
    .unwrap();

    let mut values = Vec::with_capacity(30_000);
    for i in 0..10_000i32 {
        values.push(min[0] + i % 50);
        values.push(min[1] + (i / 50) % 50);
        values.push(min[2] + i % 7);
    }

    let mut root = Node::new(ROOT_NAME, NodeKind::Leaf);
    root.attr_start = 0;
    root.attr_end = 1;
    root.num_points = 10_000;
    archive.set_node(root, vec![position_buffer(values.clone())]);

    archive.save().unwrap();
    assert_eq!(archive.metadata.encoding.as_deref(), Some("BROTLI"));

    let loaded = Archive::load(dir.path()).unwrap();
    let buffers = &loaded.node_buffers[ROOT_NAME];
    let AttributeValue::Int32(got) = &buffers[0].values else {
        panic!("expected Int32 positions");
    };
    for i in 0..10_000usize {
        assert_eq!(got[i * 3], values[i * 3] - min[0]);
        assert_eq!(got[i * 3 + 1], values[i * 3 + 1] - min[1]);
        assert_eq!(got[i * 3 + 2], values[i * 3 + 2] - min[2]);
    }
}
