use crate::board::BoardModel;
use crate::route::RouterResult;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

const LAYER_COLORS: [Rgba<u8>; 6] = [
    Rgba([0, 110, 255, 220]),  // F.Cu
    Rgba([255, 20, 80, 220]),  // B.Cu
    Rgba([0, 255, 100, 220]),  // In1.Cu
    Rgba([255, 215, 0, 220]),  // In2.Cu
    Rgba([180, 50, 255, 220]), // In3.Cu
    Rgba([0, 240, 255, 220]),  // In4.Cu
];

pub fn draw_routed_board(board: &BoardModel, result: &RouterResult, filename: &str, width: u32, height: u32) {
    let w = width.max(1200);
    let h = height.max(1200);
    let mut img = RgbaImage::new(w, h);
    image::imageops::replace(
        &mut img,
        &RgbaImage::from_pixel(w, h, Rgba([15, 15, 18, 255])),
        0,
        0,
    );

    let bounds = board.bounds();
    let bw = bounds.width();
    let bh = bounds.height();
    if bw <= 0.0 || bh <= 0.0 {
        return;
    }

    let scale_x = w as f64 / bw;
    let scale_y = h as f64 / bh;
    let map = |x: f64, y: f64| ((x - bounds.min.x) * scale_x, h as f64 - (y - bounds.min.y) * scale_y);

    let pad_color = Rgba([90, 90, 95, 255]);
    for pad in board.all_pads() {
        let (x, y) = map(pad.x - pad.width / 2.0, pad.y + pad.height / 2.0);
        let pw = (pad.width * scale_x).max(1.0);
        let ph = (pad.height * scale_y).max(1.0);
        let rect = ImageRect::at(x as i32, y as i32).of_size(pw as u32, ph as u32);
        draw_filled_rect_mut(&mut img, rect, pad_color);
    }

    let mut segments: Vec<_> = result.routes.iter().flat_map(|r| r.segments.iter()).collect();
    segments.sort_by_key(|s| s.layer);

    for seg in segments {
        let (x1, y1) = map(seg.x1, seg.y1);
        let (x2, y2) = map(seg.x2, seg.y2);
        let color_idx = (seg.layer as usize).min(LAYER_COLORS.len() - 1);
        draw_line_segment_mut(&mut img, (x1 as f32, y1 as f32), (x2 as f32, y2 as f32), LAYER_COLORS[color_idx]);
    }

    let via_color = Rgba([255, 255, 255, 230]);
    for via in result.routes.iter().flat_map(|r| r.vias.iter()) {
        let (x, y) = map(via.x, via.y);
        let rect = ImageRect::at(x as i32 - 2, y as i32 - 2).of_size(4, 4);
        draw_filled_rect_mut(&mut img, rect, via_color);
    }

    let _ = img.save(Path::new(filename));
}
