// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Popup card: volume readout, bar, output selector and toasts.

use crate::bridge::BridgeCall;
use crate::message::Message;
use crate::render::{OsdContent, SinkEntry, VolumeBar};
use crate::state::{ToastKind, Toasts};
use crate::ui::theme::*;
use iced::widget::{button, column, container, mouse_area, row, text, Column, Space};
use iced::{Alignment, Background, Border, Element, Fill, Length, Theme};

/// Bridge call made when a sink row is clicked.
///
/// Only an inactive sink can be selected; clicking the active one is just
/// logged.
pub fn sink_click(entry: &SinkEntry) -> Message {
    let call = if entry.active {
        BridgeCall::Log {
            message: format!("{} is already the default output", entry.name),
        }
    } else {
        BridgeCall::SelectSink {
            name: entry.name.clone(),
        }
    };
    Message::Bridge(call, 0)
}

/// Render the whole popup at the given opacity.
pub fn popup<'a>(
    content: Option<&'a OsdContent>,
    toasts: &'a Toasts,
    opacity: f32,
) -> Element<'a, Message> {
    let body: Element<'a, Message> = match content {
        Some(OsdContent::Volume {
            label,
            bar,
            muted,
            sinks,
            debug_line,
        }) => volume_body(label, *bar, *muted, sinks, debug_line.as_deref(), opacity),
        Some(OsdContent::Missing { template }) => text(format!("Template {} not found", template))
            .size(16)
            .color(faded(WARNING, opacity))
            .into(),
        None => Space::new().into(),
    };

    let mut layout = column![body].spacing(SPACING).align_x(Alignment::Center);
    for toast in toasts.iter() {
        let color = match toast.kind {
            ToastKind::Success => SUCCESS,
            ToastKind::Error => MUTED_COLOR,
        };
        layout = layout.push(
            container(text(toast.message.clone()).size(12).color(faded(TEXT, opacity)))
                .padding([4, 10])
                .width(Fill)
                .style(move |_theme: &Theme| container::Style {
                    background: Some(Background::Color(faded(color, 0.85 * opacity))),
                    border: Border::default().rounded(BORDER_RADIUS),
                    ..container::Style::default()
                }),
        );
    }

    let card = container(layout)
        .padding(PADDING)
        .width(Fill)
        .height(Fill)
        .center_x(Fill)
        .center_y(Fill)
        .style(move |_theme: &Theme| container::Style {
            background: Some(Background::Color(faded(SURFACE, opacity))),
            border: card_border(opacity),
            ..container::Style::default()
        });

    mouse_area(card)
        .on_enter(Message::PointerEntered)
        .on_exit(Message::PointerLeft)
        .into()
}

fn volume_body<'a>(
    label: &'a str,
    bar: VolumeBar,
    muted: bool,
    sinks: &'a [SinkEntry],
    debug_line: Option<&'a str>,
    opacity: f32,
) -> Element<'a, Message> {
    let value_color = if muted { TEXT_DIM } else { TEXT };
    let readout = row![
        text(label).size(VALUE_TEXT_SIZE).color(faded(value_color, opacity)),
        text("%").size(20).color(faded(TEXT_DIM, opacity)),
    ]
    .spacing(SPACING_SMALL)
    .align_y(Alignment::End);

    let mut body = Column::new()
        .spacing(SPACING)
        .align_x(Alignment::Center)
        .push(readout)
        .push(volume_bar(bar, muted, opacity));

    if muted {
        body = body.push(text("MUTED").size(14).color(faded(MUTED_COLOR, opacity)));
    }

    if !sinks.is_empty() {
        body = body.push(sink_list(sinks, opacity));
    }

    if let Some(line) = debug_line {
        body = body.push(text(line).size(10).color(faded(TEXT_DIM, opacity)));
    }

    body.into()
}

fn volume_bar<'a>(bar: VolumeBar, muted: bool, opacity: f32) -> Element<'a, Message> {
    let standard_color = if muted { TEXT_DIM } else { PRIMARY };
    let segments = [
        (bar.standard, standard_color),
        (bar.excess, EXCESS),
        (bar.empty(), SURFACE_LIGHT),
    ];

    let track = segments
        .into_iter()
        .filter_map(|(fraction, color)| {
            let portion = (fraction * 1000.0).round() as u16;
            (portion > 0).then(|| {
                container(Space::new())
                    .width(Length::FillPortion(portion))
                    .height(BAR_HEIGHT)
                    .style(move |_theme: &Theme| container::Style {
                        background: Some(Background::Color(faded(color, opacity))),
                        ..container::Style::default()
                    })
                    .into()
            })
        })
        .fold(row![].width(Fill), |track, segment: Element<'a, Message>| {
            track.push(segment)
        });

    container(track)
        .width(Fill)
        .style(|_theme: &Theme| container::Style {
            border: Border::default().rounded(BAR_HEIGHT / 2.0),
            ..container::Style::default()
        })
        .into()
}

fn sink_list<'a>(sinks: &'a [SinkEntry], opacity: f32) -> Element<'a, Message> {
    let mut list = Column::new().spacing(SPACING_SMALL).width(Fill);
    for entry in sinks {
        let active = entry.active;
        let marker = if active { "● " } else { "○ " };
        let label = text(format!("{}{}", marker, entry.label))
            .size(13)
            .color(faded(if active { PRIMARY } else { TEXT }, opacity));

        let item = button(label)
            .width(Fill)
            .padding([4, 8])
            .style(move |_theme: &Theme, status| {
                let hovered = matches!(status, button::Status::Hovered);
                let background = if active || hovered {
                    faded(SURFACE_LIGHT, opacity)
                } else {
                    iced::Color::TRANSPARENT
                };
                button::Style {
                    background: Some(Background::Color(background)),
                    text_color: faded(TEXT, opacity),
                    border: Border::default().rounded(BORDER_RADIUS),
                    ..button::Style::default()
                }
            })
            .on_press(sink_click(entry));
        list = list.push(item);
    }
    list.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render;
    use volosd_ipc::{SinkInfo, UpdateRequest};

    #[test]
    fn test_clicking_inactive_sink_selects_it_once() {
        let request = UpdateRequest {
            value: Some(50.0),
            sinks: vec![SinkInfo::new("a", "A", true), SinkInfo::new("b", "B", false)],
            ..UpdateRequest::new("volume")
        };
        let content = render(&request);

        assert_eq!(content.sinks().iter().filter(|s| s.active).count(), 1);

        let selected: Vec<String> = content
            .sinks()
            .iter()
            .map(sink_click)
            .filter_map(|message| match message {
                Message::Bridge(BridgeCall::SelectSink { name }, 0) => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(selected, vec!["b".to_string()]);

        assert!(matches!(
            sink_click(&content.sinks()[0]),
            Message::Bridge(BridgeCall::Log { .. }, 0)
        ));
    }
}
