use mandeltile_core::{escape_count, ViewCommand, ViewState};

/// Compute every pixel of a canvas and collect counts into a flat Vec.
fn render_grid(view: &ViewState, width: u32, height: u32) -> Vec<u32> {
    let mut counts = Vec::with_capacity((width * height) as usize);
    for py in 0..height {
        for px in 0..width {
            let (x, y) = view.pixel_to_point(width, height, px, py);
            counts.push(escape_count(x, y, view.max_iterations));
        }
    }
    counts
}

#[test]
fn headless_initial_view() {
    let view = ViewState::initial(100);
    let counts = render_grid(&view, 100, 100);

    assert_eq!(counts.len(), 100 * 100);

    let interior = counts.iter().filter(|&&n| n == view.max_iterations).count();
    let escaped = counts.len() - interior;
    assert!(escaped > 0, "should have some escaped points");
    assert!(interior > 0, "should have some interior points");
}

#[test]
fn headless_render_is_deterministic() {
    let view = ViewState::initial(60);
    assert_eq!(render_grid(&view, 80, 60), render_grid(&view, 80, 60));
}

#[test]
fn more_iterations_never_lowers_counts() {
    let view = ViewState::initial(40);
    let deeper = view.apply(ViewCommand::MoreIterations, 40, 40);

    let shallow = render_grid(&view, 40, 40);
    let deep = render_grid(&deeper, 40, 40);
    for (a, b) in shallow.iter().zip(&deep) {
        assert!(b >= a);
    }
}

#[test]
fn snapshot_json_round_trip() {
    let view = ViewState::new(-0.743643887, 0.131825904, 1e-7, 1200).unwrap();
    let json = serde_json::to_string(&view).unwrap();
    let back: ViewState = serde_json::from_str(&json).unwrap();
    assert_eq!(view, back);
}

#[test]
fn snapshot_json_rejects_invalid_scale() {
    let json = r#"{"cx":0.0,"cy":0.0,"per_pixel":0.0,"max_iterations":10}"#;
    assert!(serde_json::from_str::<ViewState>(json).is_err());
}
