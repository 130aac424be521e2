// Bresenham line rasterization on the tile grid.
//
// Yields every tile on the straight line from `start` to `end`, both ends
// included. The step rule (`e2 > -dy` moves x, `e2 < dx` moves y, both may
// fire on one step) gives 8-connected lines, so a diagonal line samples one
// tile per step rather than a staircase.

/// Iterator over the `(x, y)` tiles of a line.
#[derive(Clone, Debug)]
pub struct BresenhamLine {
    x: i32,
    y: i32,
    end_x: i32,
    end_y: i32,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    done: bool,
}

impl BresenhamLine {
    pub fn new(start: (i32, i32), end: (i32, i32)) -> Self {
        let dx = (end.0 - start.0).abs();
        let dy = (end.1 - start.1).abs();
        Self {
            x: start.0,
            y: start.1,
            end_x: end.0,
            end_y: end.1,
            dx,
            dy,
            sx: if start.0 < end.0 { 1 } else { -1 },
            sy: if start.1 < end.1 { 1 } else { -1 },
            err: dx - dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.done {
            return None;
        }
        let current = (self.x, self.y);
        if self.x == self.end_x && self.y == self.end_y {
            self.done = true;
            return Some(current);
        }
        let e2 = 2 * self.err;
        if e2 > -self.dy {
            self.err -= self.dy;
            self.x += self.sx;
        }
        if e2 < self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(current)
    }
}
