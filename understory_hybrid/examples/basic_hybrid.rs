// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Understory Hybrid: insert points and boxes, query, move, and walk.

use core::ops::ControlFlow;

use understory_hybrid::{Aabb2D, Child, Hierarchy, HybridIndex, Route};

fn main() {
    let domain = Aabb2D::new(-180.0, -90.0, 180.0, 90.0);
    let mut idx: HybridIndex<f64, &str> = HybridIndex::new(domain);

    idx.insert(Aabb2D::from_point(1.0, 1.0), "cafe");
    idx.insert(Aabb2D::from_point(2.5, 0.5), "kiosk");
    idx.insert(Aabb2D::new(10.0, 10.0, 20.0, 20.0), "park");
    // Outside the domain, so it is stored as a box.
    idx.insert(Aabb2D::from_point(300.0, 0.0), "buoy");
    println!(
        "{} items: {} points, {} rects, bounds {:?}",
        idx.len(),
        idx.point_len(),
        idx.rect_len(),
        idx.bounds()
    );

    // Query a window
    let mut hits = Vec::new();
    let _ = idx.search(Aabb2D::new(0.0, 0.0, 12.0, 12.0), |bbox, name| {
        hits.push((*name, bbox));
        ControlFlow::Continue(())
    });
    println!("hits in (0,0)-(12,12): {hits:?}");

    // Move the kiosk into the park; it becomes a box and changes sides.
    let moved_to = Aabb2D::new(14.0, 14.0, 15.0, 15.0);
    assert_eq!(idx.classify(&moved_to), Route::Rect);
    idx.replace(Aabb2D::from_point(2.5, 0.5), &"kiosk", moved_to, "kiosk");
    println!("after move: {:?}", idx.stats());

    // Walk the combined hierarchy
    let mut stack = vec![(None, 0)];
    let mut buf = Vec::new();
    while let Some((parent, depth)) = stack.pop() {
        buf = idx.children(parent, buf).expect("handles come from this index");
        for child in &buf {
            match child {
                Child::Item { bbox, data } => {
                    println!("{:indent$}{data} {bbox:?}", "", indent = depth * 2);
                }
                Child::Node { node, .. } => stack.push((Some(*node), depth + 1)),
            }
        }
    }
}
