//! # Staff Widget
//!
//! A five-line staff rendered on an Iced canvas: one quarter note per
//! sequence note, ledger lines where the melody leaves the staff, and
//! progress highlighting while a matching session runs. A simplified staff,
//! not an engraving engine; note labels are drawn underneath instead of a
//! clef.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Theme, mouse};
use trainer_core::note::NoteClass;

/// Vertical distance between staff lines.
const LINE_GAP: f32 = 14.0;
const HEAD_RADIUS: f32 = 5.5;
const STEM_LENGTH: f32 = 3.5 * LINE_GAP;
const LEFT_MARGIN: f32 = 30.0;
const RIGHT_MARGIN: f32 = 20.0;
const STAFF_TOP: f32 = 40.0;

/// Diatonic step of E4, the bottom line of the treble staff.
const BOTTOM_LINE_STEP: i32 = 30;

const LINE_COLOR: Color = Color {
    r: 0xAA as f32 / 255.0,
    g: 0xAA as f32 / 255.0,
    b: 0xAA as f32 / 255.0,
    a: 1.0,
};
const UPCOMING_COLOR: Color = Color {
    r: 0xE8 as f32 / 255.0,
    g: 0xE8 as f32 / 255.0,
    b: 0xE8 as f32 / 255.0,
    a: 1.0,
};
// Keyboard-highlight palette: green for sung notes, red for the current one.
const SUNG_COLOR: Color = Color {
    r: 0x34 as f32 / 255.0,
    g: 0xDB as f32 / 255.0,
    b: 0x98 as f32 / 255.0,
    a: 1.0,
};
const CURRENT_COLOR: Color = Color {
    r: 0xFF as f32 / 255.0,
    g: 0x33 as f32 / 255.0,
    b: 0x33 as f32 / 255.0,
    a: 1.0,
};

/// Staff view of a target sequence with optional progress highlighting.
#[derive(Debug, Clone)]
pub struct Staff {
    notes: Vec<NoteClass>,
    /// Position of the note currently expected, while matching.
    position: Option<usize>,
    /// True once the whole sequence was matched.
    completed: bool,
}

impl Staff {
    pub fn new(notes: Vec<NoteClass>, position: Option<usize>, completed: bool) -> Self {
        Self {
            notes,
            position,
            completed,
        }
    }

    // Consumes `self`, same trick as the other canvas widgets, so the
    // element does not borrow from the app state.
    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(180.0)),
        )
        .into()
    }

    /// Diatonic step of a note: staff lines and spaces count as one step
    /// each. Sharps sit on the same position as their natural.
    fn diatonic_step(note: &NoteClass) -> i32 {
        let degree = match note.collapsed().semitone() {
            0 => 0,  // C
            2 => 1,  // D
            4 => 2,  // E
            5 => 3,  // F
            7 => 4,  // G
            9 => 5,  // A
            11 => 6, // B
            _ => 0, // collapse leaves only naturals
        };
        note.octave() * 7 + degree
    }

    fn step_y(step: i32) -> f32 {
        let bottom_line = STAFF_TOP + 4.0 * LINE_GAP;
        bottom_line - (step - BOTTOM_LINE_STEP) as f32 * (LINE_GAP / 2.0)
    }
}

impl<Message> canvas::Program<Message> for Staff {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        // The five staff lines, bottom line = E4.
        let right = bounds.width - RIGHT_MARGIN;
        for i in 0..5 {
            let y = STAFF_TOP + i as f32 * LINE_GAP;
            frame.stroke(
                &Path::line(Point::new(LEFT_MARGIN, y), Point::new(right, y)),
                Stroke::default().with_color(LINE_COLOR),
            );
        }

        let count = self.notes.len().max(1);
        let span = right - LEFT_MARGIN;

        for (i, note) in self.notes.iter().enumerate() {
            let x = LEFT_MARGIN + span * (i as f32 + 0.5) / count as f32;
            let step = Self::diatonic_step(note);
            let y = Self::step_y(step);

            let color = match self.position {
                Some(p) if i < p => SUNG_COLOR,
                Some(p) if i == p => CURRENT_COLOR,
                _ if self.completed => SUNG_COLOR,
                _ => UPCOMING_COLOR,
            };

            // Ledger lines between the staff and an out-of-staff head.
            // Even steps are line positions.
            let mut ledger = BOTTOM_LINE_STEP - 2;
            while ledger >= step {
                if ledger % 2 == 0 {
                    self.draw_ledger(&mut frame, x, ledger);
                }
                ledger -= 1;
            }
            let mut ledger = BOTTOM_LINE_STEP + 10;
            while ledger <= step {
                if ledger % 2 == 0 {
                    self.draw_ledger(&mut frame, x, ledger);
                }
                ledger += 1;
            }

            // Head and stem. Stems flip direction above the middle line.
            frame.fill(&Path::circle(Point::new(x, y), HEAD_RADIUS), color);
            let stem = if step < BOTTOM_LINE_STEP + 4 {
                Path::line(
                    Point::new(x + HEAD_RADIUS, y),
                    Point::new(x + HEAD_RADIUS, y - STEM_LENGTH),
                )
            } else {
                Path::line(
                    Point::new(x - HEAD_RADIUS, y),
                    Point::new(x - HEAD_RADIUS, y + STEM_LENGTH),
                )
            };
            frame.stroke(&stem, Stroke::default().with_color(color).with_width(1.5));

            // Label under the staff instead of a clef.
            frame.fill_text(canvas::Text {
                content: note.label(),
                position: Point::new(x, STAFF_TOP + 4.0 * LINE_GAP + 30.0),
                color: LINE_COLOR,
                size: 14.0.into(),
                horizontal_alignment: iced::alignment::Horizontal::Center,
                ..canvas::Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}

impl Staff {
    fn draw_ledger(&self, frame: &mut canvas::Frame, x: f32, step: i32) {
        let y = Self::step_y(step);
        frame.stroke(
            &Path::line(
                Point::new(x - HEAD_RADIUS * 1.8, y),
                Point::new(x + HEAD_RADIUS * 1.8, y),
            ),
            Stroke::default().with_color(LINE_COLOR),
        );
    }
}
