//! Property tests for the viewport
//!
//! Arbitrary sequences of pointer, wheel and button input must keep the
//! scale inside its bounds, and reset must always return to identity.

use mermaid_studio::viewport::{Viewport, ViewportTransform, MAX_SCALE, MIN_SCALE};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Input {
    DragStart(f64, f64),
    DragMove(f64, f64),
    DragEnd,
    Leave,
    Wheel(f64),
    ZoomIn,
    ZoomOut,
}

fn input() -> impl Strategy<Value = Input> {
    let coord = -1.0e4..1.0e4f64;
    prop_oneof![
        (coord.clone(), coord.clone()).prop_map(|(x, y)| Input::DragStart(x, y)),
        (coord.clone(), coord).prop_map(|(x, y)| Input::DragMove(x, y)),
        Just(Input::DragEnd),
        Just(Input::Leave),
        (-5.0e3..5.0e3f64).prop_map(Input::Wheel),
        Just(Input::ZoomIn),
        Just(Input::ZoomOut),
    ]
}

fn apply(viewport: &mut Viewport, input: &Input) {
    match *input {
        Input::DragStart(x, y) => viewport.on_drag_start(x, y),
        Input::DragMove(x, y) => viewport.on_drag_move(x, y),
        Input::DragEnd => viewport.on_drag_end(),
        Input::Leave => viewport.on_pointer_leave(),
        Input::Wheel(delta) => viewport.on_wheel(delta),
        Input::ZoomIn => viewport.zoom_in(),
        Input::ZoomOut => viewport.zoom_out(),
    }
}

proptest! {
    #[test]
    fn scale_stays_within_bounds(inputs in prop::collection::vec(input(), 0..64)) {
        let mut viewport = Viewport::new();
        for input in &inputs {
            apply(&mut viewport, input);
            let scale = viewport.scale();
            prop_assert!((MIN_SCALE..=MAX_SCALE).contains(&scale), "scale {} out of bounds", scale);
        }
    }

    #[test]
    fn reset_always_returns_identity(inputs in prop::collection::vec(input(), 0..64)) {
        let mut viewport = Viewport::new();
        for input in &inputs {
            apply(&mut viewport, input);
        }
        viewport.reset();
        prop_assert_eq!(viewport.transform(), ViewportTransform::IDENTITY);
    }

    #[test]
    fn drag_moves_by_pointer_delta(
        start in (-1.0e3..1.0e3f64, -1.0e3..1.0e3f64),
        delta in (-1.0e3..1.0e3f64, -1.0e3..1.0e3f64),
    ) {
        let mut viewport = Viewport::new();
        viewport.on_drag_start(start.0, start.1);
        viewport.on_drag_move(start.0 + delta.0, start.1 + delta.1);
        let transform = viewport.transform();
        prop_assert!((transform.offset_x - delta.0).abs() < 1e-9);
        prop_assert!((transform.offset_y - delta.1).abs() < 1e-9);
        prop_assert_eq!(transform.scale, 1.0);
    }

    #[test]
    fn reset_mid_drag_pans_from_identity(
        start in (-1.0e3..1.0e3f64, -1.0e3..1.0e3f64),
        first in (-1.0e3..1.0e3f64, -1.0e3..1.0e3f64),
        delta in (-1.0e3..1.0e3f64, -1.0e3..1.0e3f64),
    ) {
        let mut viewport = Viewport::new();
        viewport.on_drag_start(start.0, start.1);
        let pointer = (start.0 + first.0, start.1 + first.1);
        viewport.on_drag_move(pointer.0, pointer.1);
        viewport.reset();
        viewport.on_drag_move(pointer.0 + delta.0, pointer.1 + delta.1);
        let transform = viewport.transform();
        prop_assert!((transform.offset_x - delta.0).abs() < 1e-6);
        prop_assert!((transform.offset_y - delta.1).abs() < 1e-6);
    }
}
