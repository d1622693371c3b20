//! # Main Display Module
//!
//! Layout for the trainer window: title, staff, feedback line and the three
//! action buttons.

use iced::widget::{Space, button, column, container, row, text};
use iced::{Alignment, Color, Element, Length, Theme};
use trainer_core::matcher::Phase;

use super::staff::Staff;
use crate::{FeedbackTone, Message, TrainerApp};

// Same palette as the staff highlighting.
const CORRECT_COLOR: Color = Color {
    r: 0x34 as f32 / 255.0,
    g: 0xDB as f32 / 255.0,
    b: 0x98 as f32 / 255.0,
    a: 1.0,
};
const INCORRECT_COLOR: Color = Color {
    r: 0xFF as f32 / 255.0,
    g: 0x33 as f32 / 255.0,
    b: 0x33 as f32 / 255.0,
    a: 1.0,
};

/// Creates the complete main application view.
pub fn create_main_view(app: &TrainerApp) -> Element<'_, Message> {
    let title = text("Solfège Trainer").size(28);

    let session = app.session();
    let position = match session.phase() {
        Phase::Awaiting(p) => Some(p),
        _ => None,
    };
    let staff = Staff::new(
        app.sequence().notes().to_vec(),
        position,
        session.phase() == Phase::Completed,
    )
    .view();

    let (message, tone) = app.feedback();
    let color = match tone {
        FeedbackTone::Neutral => None,
        FeedbackTone::Correct => Some(CORRECT_COLOR),
        FeedbackTone::Incorrect => Some(INCORRECT_COLOR),
    };
    let feedback = text(message.to_string())
        .size(20)
        .style(move |_theme: &Theme| text::Style { color });

    let controls = app.controls();
    let buttons = row![
        button(text("Connect microphone"))
            .on_press_maybe(controls.connect_enabled.then_some(Message::ConnectMic)),
        button(text("Play sequence"))
            .on_press_maybe(controls.play_enabled.then_some(Message::PlaySequence)),
        button(text("Start matching"))
            .on_press_maybe(controls.match_enabled.then_some(Message::StartMatching)),
    ]
    .spacing(10);

    let content = column![
        title,
        Space::with_height(10),
        staff,
        feedback,
        Space::with_height(10),
        buttons,
    ]
    .spacing(10)
    .align_x(Alignment::Center)
    .width(Length::Fill);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .padding(20)
        .center_x(Length::Fill)
        .into()
}
