//! dinner-menu chat panel on bevy ui (native + wasm).
//! - status badge (dot + label), scrolling bubble list, prompt line, submit button.
//! - the panel is just a `ChatView`: every `ChatViewEvt` is replayed onto it.
//! - key comes from the build env: `OPENAI_API_KEY=... cargo run --example chat`.
//!
//! type with the keyboard, enter or the button submits. input is ignored while
//! a request is in flight.

use bevy::input::keyboard::{KeyCode, KeyboardInput};
use bevy::prelude::*;
use bevy::ui::ScrollPosition;
use bevy_dinner_chat::{
    ApiStatus, ChatConfig, ChatErrorEvt, ChatRole, ChatSession, ChatSet, ChatView, ChatViewEvt,
    DinnerChatPlugin, MessageId, submit_user_text,
};
use std::collections::HashMap;

const SUBMIT_LABEL: &str = "추천 받기";
const SUBMIT_LOADING: &str = "추천 중...";
const PROMPT_HINT: &str = "예) 시원하고 가벼운 메뉴 없을까?";

// ---------------------- ui tags ----------------------

#[derive(Component)]
struct MessageList;
#[derive(Component)]
struct PromptText;
#[derive(Component)]
struct StatusText;
#[derive(Component)]
struct StatusDot;
#[derive(Component)]
struct BtnSubmit;
#[derive(Component)]
struct SubmitLabel;

#[derive(Component, Copy, Clone)]
struct TargetSession(Entity);

// ---------------------- app state ----------------------

#[derive(Resource, Default)]
struct PromptBuf(String);

#[derive(Resource)]
struct InputEnabled(bool);
impl Default for InputEnabled {
    fn default() -> Self {
        Self(true)
    }
}

#[derive(Resource, Default)]
struct StatusBadge {
    status: ApiStatus,
    label: String,
}

/// bubble body entities by message id, so updates can land in the frame the bubble is spawned.
#[derive(Resource, Default)]
struct BubbleIndex(HashMap<MessageId, Entity>);

#[derive(Resource, Clone)]
struct PanelFont(TextFont);

fn status_color(status: ApiStatus) -> Color {
    match status {
        ApiStatus::Idle => Color::srgb(0.55, 0.55, 0.6),
        ApiStatus::Checking => Color::srgb(0.95, 0.75, 0.25),
        ApiStatus::Ready => Color::srgb(0.3, 0.8, 0.45),
        ApiStatus::Missing => Color::srgb(0.9, 0.5, 0.2),
        ApiStatus::Error => Color::srgb(0.9, 0.3, 0.3),
    }
}

fn avatar(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "🙂",
        _ => "🌿",
    }
}

// ---------------------- the panel as a ChatView ----------------------

struct PanelView<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
    list: Entity,
    font: &'a TextFont,
    bubbles: &'a mut BubbleIndex,
    prompt: &'a mut PromptBuf,
    input: &'a mut InputEnabled,
    badge: &'a mut StatusBadge,
}

impl ChatView for PanelView<'_, '_, '_> {
    fn append_message(&mut self, id: MessageId, role: ChatRole, text: &str) {
        let (justify, bg) = match role {
            ChatRole::User => (JustifyContent::FlexEnd, Color::srgb(0.22, 0.3, 0.45)),
            _ => (JustifyContent::FlexStart, Color::srgb(0.16, 0.2, 0.18)),
        };
        let body = self
            .commands
            .spawn((Text::new(text), self.font.clone(), TextColor(Color::WHITE)))
            .id();
        let bubble = self
            .commands
            .spawn((
                Node {
                    width: Val::Percent(100.0),
                    flex_direction: FlexDirection::Row,
                    justify_content: justify,
                    column_gap: Val::Px(8.0),
                    ..default()
                },
                BackgroundColor(Color::NONE),
            ))
            .id();
        let card = self
            .commands
            .spawn((
                Node {
                    max_width: Val::Percent(80.0),
                    column_gap: Val::Px(6.0),
                    padding: UiRect::axes(Val::Px(10.0), Val::Px(6.0)),
                    ..default()
                },
                BackgroundColor(bg),
                BorderRadius::all(Val::Px(8.0)),
            ))
            .id();
        let face = self
            .commands
            .spawn((Text::new(avatar(role)), self.font.clone(), TextColor(Color::WHITE)))
            .id();
        self.commands.entity(card).add_children(&[face, body]);
        self.commands.entity(bubble).add_child(card);
        self.commands.entity(self.list).add_child(bubble);
        // layout clamps this to the bottom of the content
        self.commands
            .entity(self.list)
            .insert(ScrollPosition { offset_x: 0.0, offset_y: f32::MAX });
        self.bubbles.0.insert(id, body);
    }

    fn update_message(&mut self, id: MessageId, text: &str) {
        match self.bubbles.0.get(&id) {
            Some(body) => {
                self.commands.entity(*body).insert(Text::new(text));
            }
            None => warn!(target: "chat_panel", "update for unknown bubble {:?}", id),
        }
    }

    fn set_status(&mut self, status: ApiStatus, label: &str) {
        self.badge.status = status;
        self.badge.label = label.to_string();
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input.0 = enabled;
    }

    fn clear_input(&mut self) {
        self.prompt.0.clear();
    }
}

// ---------------------- main ----------------------

fn main() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    App::new()
        .insert_resource(ClearColor(Color::srgb_u8(18, 18, 20)))
        .insert_resource(ChatConfig::from_build_env())
        .init_resource::<PromptBuf>()
        .init_resource::<InputEnabled>()
        .init_resource::<StatusBadge>()
        .init_resource::<BubbleIndex>()
        .add_plugins(DefaultPlugins)
        .add_plugins(DinnerChatPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, (handle_text_input, btn_submit))
        // event readers should run after the plugin emits events
        .add_systems(
            Update,
            (on_view, on_error, refresh_status, refresh_prompt_text, refresh_submit)
                .chain()
                .after(ChatSet::Drain),
        )
        .run();
}

// ---------------------- setup ui ----------------------

fn setup(mut commands: Commands, assets: Res<AssetServer>, config: Res<ChatConfig>) {
    info!(
        target: "chat_panel",
        "setup: endpoint='{}', model='{}', key_present={}",
        config.endpoint, config.model, config.has_credential()
    );
    commands.spawn(Camera2d);

    let session = commands.spawn(ChatSession::new((*config).clone())).id();

    // hangul needs a cjk font; drop one at assets/fonts/
    let font: Handle<Font> = assets.load("fonts/NotoSansKR-Regular.ttf");
    let style_18 = TextFont { font: font.clone(), font_size: 18.0, ..default() };
    let style_14 = TextFont { font, font_size: 14.0, ..default() };
    commands.insert_resource(PanelFont(style_18.clone()));

    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(8.0),
                padding: UiRect::all(Val::Px(12.0)),
                ..default()
            },
            BackgroundColor(Color::NONE),
        ))
        .with_children(|p| {
            // --- hero + status badge ---
            p.spawn((Text::new("오늘 저녁, 무엇이 어울릴까요?"), style_18.clone(), TextColor(Color::WHITE)));
            p.spawn(Node {
                flex_direction: FlexDirection::Row,
                align_items: AlignItems::Center,
                column_gap: Val::Px(6.0),
                ..default()
            })
            .with_children(|row| {
                row.spawn((
                    Node { width: Val::Px(10.0), height: Val::Px(10.0), ..default() },
                    BackgroundColor(status_color(ApiStatus::Idle)),
                    BorderRadius::MAX,
                    StatusDot,
                ));
                row.spawn((
                    Text::new("API 키 상태를 확인하는 중입니다."),
                    style_14.clone(),
                    TextColor(Color::srgb_u8(200, 200, 200)),
                    StatusText,
                ));
            });

            // --- message list ---
            p.spawn((
                Node {
                    width: Val::Percent(100.0),
                    flex_grow: 1.0,
                    flex_direction: FlexDirection::Column,
                    row_gap: Val::Px(8.0),
                    padding: UiRect::axes(Val::Px(8.0), Val::Px(12.0)),
                    overflow: Overflow::scroll_y(),
                    ..default()
                },
                BackgroundColor(Color::srgb(0.10, 0.10, 0.12)),
                MessageList,
                TargetSession(session),
            ));

            // --- prompt + submit ---
            p.spawn(Node {
                width: Val::Percent(100.0),
                flex_direction: FlexDirection::Row,
                column_gap: Val::Px(8.0),
                align_items: AlignItems::Center,
                ..default()
            })
            .with_children(|row| {
                row.spawn((
                    Node { flex_grow: 1.0, ..default() },
                    Text::new(format!("> {}", PROMPT_HINT)),
                    style_18.clone(),
                    TextColor(Color::WHITE),
                    PromptText,
                    TargetSession(session),
                ));
                row.spawn((
                    Button,
                    Node {
                        width: Val::Px(110.0),
                        height: Val::Px(32.0),
                        align_items: AlignItems::Center,
                        justify_content: JustifyContent::Center,
                        ..default()
                    },
                    BackgroundColor(Color::srgb(0.2, 0.2, 0.25)),
                    BtnSubmit,
                    TargetSession(session),
                ))
                .with_children(|b| {
                    b.spawn((Text::new(SUBMIT_LABEL), style_14.clone(), TextColor(Color::WHITE), SubmitLabel));
                });
            });
        });
}

// ---------------------- input & buttons ----------------------

fn handle_text_input(
    mut commands: Commands,
    mut ev_kbd: EventReader<KeyboardInput>,
    keys: Res<ButtonInput<KeyCode>>,
    input: Res<InputEnabled>,
    mut prompt: ResMut<PromptBuf>,
    q_target: Query<&TargetSession, With<PromptText>>,
) {
    if !input.0 {
        // drop keystrokes while a request is in flight
        ev_kbd.clear();
        return;
    }

    for ev in ev_kbd.read() {
        if ev.state.is_pressed() {
            if let Some(txt) = &ev.text {
                let s = txt.replace('\r', "").replace('\n', "");
                prompt.0.push_str(&s);
            }
        }
    }

    if keys.just_pressed(KeyCode::Backspace) {
        prompt.0.pop();
    }

    if keys.just_pressed(KeyCode::Enter) {
        if let Ok(TargetSession(e)) = q_target.single() {
            // the controller trims and ignores blank input itself
            submit_user_text(&mut commands, *e, prompt.0.clone());
        }
    }
}

fn btn_submit(
    mut commands: Commands,
    mut q: Query<(&Interaction, &TargetSession, &mut BackgroundColor), (Changed<Interaction>, With<BtnSubmit>)>,
    input: Res<InputEnabled>,
    prompt: Res<PromptBuf>,
) {
    for (i, TargetSession(e), mut bg) in &mut q {
        match *i {
            Interaction::Pressed => {
                bg.0 = Color::srgb(0.3, 0.3, 0.35);
                if input.0 {
                    submit_user_text(&mut commands, *e, prompt.0.clone());
                }
            }
            Interaction::Hovered => bg.0 = Color::srgb(0.25, 0.25, 0.3),
            Interaction::None => bg.0 = Color::srgb(0.2, 0.2, 0.25),
        }
    }
}

// ---------------------- chat events ----------------------

#[allow(clippy::too_many_arguments)]
fn on_view(
    mut commands: Commands,
    mut ev: EventReader<ChatViewEvt>,
    q_list: Query<(Entity, &TargetSession), With<MessageList>>,
    font: Res<PanelFont>,
    mut bubbles: ResMut<BubbleIndex>,
    mut prompt: ResMut<PromptBuf>,
    mut input: ResMut<InputEnabled>,
    mut badge: ResMut<StatusBadge>,
) {
    for ChatViewEvt { entity, command } in ev.read() {
        let Some((list, _)) = q_list.iter().find(|(_, TargetSession(t))| t == entity) else {
            continue;
        };
        let mut view = PanelView {
            commands: &mut commands,
            list,
            font: &font.0,
            bubbles: &mut bubbles,
            prompt: &mut prompt,
            input: &mut input,
            badge: &mut badge,
        };
        command.apply(&mut view);
    }
}

fn on_error(mut ev: EventReader<ChatErrorEvt>) {
    for ChatErrorEvt { entity, error } in ev.read() {
        error!(target: "chat_panel", "chat error (entity={:?}): {}", entity, error);
    }
}

// ---------------------- text refresh ----------------------

fn refresh_status(
    badge: Res<StatusBadge>,
    mut q_text: Query<&mut Text, With<StatusText>>,
    mut q_dot: Query<&mut BackgroundColor, With<StatusDot>>,
) {
    if !badge.is_changed() {
        return;
    }
    if let Ok(mut t) = q_text.single_mut() {
        t.0 = badge.label.clone();
    }
    if let Ok(mut bg) = q_dot.single_mut() {
        bg.0 = status_color(badge.status);
    }
    debug!(target: "chat_panel", "status -> {}", badge.status.style_key());
}

fn refresh_prompt_text(prompt: Res<PromptBuf>, input: Res<InputEnabled>, mut q: Query<&mut Text, With<PromptText>>) {
    if prompt.is_changed() || input.is_changed() {
        if let Ok(mut t) = q.single_mut() {
            t.0 = if prompt.0.is_empty() {
                format!("> {}", PROMPT_HINT)
            } else if input.0 {
                format!("> {} |", prompt.0)
            } else {
                format!("> {}", prompt.0)
            };
        }
    }
}

fn refresh_submit(
    input: Res<InputEnabled>,
    mut q_label: Query<&mut Text, With<SubmitLabel>>,
    mut q_btn: Query<&mut BackgroundColor, With<BtnSubmit>>,
) {
    if !input.is_changed() {
        return;
    }
    if let Ok(mut t) = q_label.single_mut() {
        t.0 = if input.0 { SUBMIT_LABEL } else { SUBMIT_LOADING }.to_string();
    }
    if let Ok(mut bg) = q_btn.single_mut() {
        bg.0 = if input.0 { Color::srgb(0.2, 0.2, 0.25) } else { Color::srgb(0.12, 0.12, 0.14) };
    }
}
