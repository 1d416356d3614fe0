use std::path::PathBuf;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};

use crate::chat::ChatView;
use crate::settings::SettingsStore;

pub const APP_TITLE: &str = "Tutor de Geometría Moderna";
pub const FOOTER_DISCLAIMER: &str = "Impulsado por Gemini. Esto es una ayuda de estudio.";
pub const FOOTER_VERIFY_NOTICE: &str = "Verifica siempre la información crítica.";

/// Returns the default themes directory path.
pub fn default_themes_path() -> PathBuf {
    PathBuf::from("./themes")
}

#[cfg(target_os = "macos")]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 16.0;
#[cfg(target_os = "windows")]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 120.0;
#[cfg(not(target_os = "windows"))]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 16.0;

/// Header height scales with the rem size so user font scaling is respected.
fn window_toolbar_height(window: &Window) -> Pixels {
    (2.5 * window.rem_size()).max(px(44.0))
}

gpui::actions!(shell, [ChangeApiKey, ToggleTheme, Quit]);

/// Root layout: header, chat view and disclaimer footer.
pub struct GeoMentorShell {
    chat_view: Entity<ChatView>,
    settings: SettingsStore,
    title_bar_should_move: bool,
}

impl GeoMentorShell {
    pub fn new(settings: SettingsStore, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let chat_view = cx.new(|cx| ChatView::new(window, cx));

        Self {
            chat_view,
            settings,
            title_bar_should_move: false,
        }
    }

    fn change_api_key(&mut self, cx: &mut Context<Self>) {
        self.chat_view
            .update(cx, |chat_view, cx| chat_view.change_credential(cx));
    }

    fn toggle_theme(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let next = self.settings.settings().toggled();
        if let Err(error) = self.settings.update(next) {
            tracing::warn!(error = %error, "failed to save appearance settings");
        }
        self.settings.settings().apply_theme(Some(window), cx);
        cx.notify();
    }
}

impl Render for GeoMentorShell {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let toolbar_height = window_toolbar_height(window);

        v_flex()
            .id("app-shell")
            .size_full()
            .bg(theme.background)
            .on_action(cx.listener(|this, _: &ChangeApiKey, _window, cx| {
                this.change_api_key(cx);
            }))
            .on_action(cx.listener(|this, _: &ToggleTheme, window, cx| {
                this.toggle_theme(window, cx);
            }))
            .child(self.render_header(window, toolbar_height, cx))
            .child(
                div()
                    .id("main-content")
                    .flex_1()
                    .w_full()
                    .min_h_0()
                    .overflow_hidden()
                    .child(self.chat_view.clone()),
            )
            .child(self.render_footer(cx))
    }
}

impl GeoMentorShell {
    fn render_header(
        &self,
        window: &Window,
        toolbar_height: Pixels,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();
        let theme_icon = if theme.mode.is_dark() {
            IconName::Sun
        } else {
            IconName::Moon
        };

        h_flex()
            .id("app-header")
            .window_control_area(WindowControlArea::Drag)
            .on_mouse_down_out(cx.listener(|this, _, _window, _cx| {
                this.title_bar_should_move = false;
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = false;
                }),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = true;
                }),
            )
            .on_mouse_move(cx.listener(|this, _, window, _cx| {
                if this.title_bar_should_move {
                    this.title_bar_should_move = false;
                    window.start_window_move();
                }
            }))
            .w_full()
            .h(toolbar_height)
            .flex_shrink_0()
            .pl(px(WINDOW_TOOLBAR_LEFT_SAFE_PADDING))
            .pr(px(WINDOW_TOOLBAR_RIGHT_SAFE_PADDING))
            .items_center()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(div().flex_1())
            .child(
                Label::new(APP_TITLE)
                    .text_xl()
                    .font_weight(FontWeight::BOLD)
                    .text_color(theme.primary),
            )
            .child(
                h_flex().flex_1().justify_end().child(
                    Button::new("toggle-theme")
                        .ghost()
                        .small()
                        .icon(theme_icon)
                        .on_click(cx.listener(|this, _, window, cx| {
                            this.toggle_theme(window, cx);
                        })),
                ),
            )
            .when(
                cfg!(target_os = "linux") && window.window_controls().window_menu,
                |title_bar| {
                    title_bar.on_mouse_down(MouseButton::Right, |event, window, _| {
                        window.show_window_menu(event.position);
                    })
                },
            )
            .child(self.render_linux_window_controls(window, cx))
    }

    fn render_linux_window_controls(&self, window: &Window, cx: &Context<Self>) -> AnyElement {
        #[cfg(target_os = "linux")]
        {
            let maximize_icon = if window.is_maximized() {
                IconName::WindowRestore
            } else {
                IconName::WindowMaximize
            };

            h_flex()
                .id("linux-window-controls")
                .items_center()
                // Keep control clicks from reaching the header drag gestures.
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .on_mouse_down(MouseButton::Right, |_, _, cx| cx.stop_propagation())
                .gap_2()
                .ml_2()
                .child(
                    Button::new("linux-window-minimize")
                        .ghost()
                        .small()
                        .icon(IconName::WindowMinimize)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.minimize_window();
                        })),
                )
                .child(
                    Button::new("linux-window-maximize")
                        .ghost()
                        .small()
                        .icon(maximize_icon)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.zoom_window();
                        })),
                )
                .child(
                    Button::new("linux-window-close")
                        .ghost()
                        .small()
                        .icon(IconName::WindowClose)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.remove_window();
                        })),
                )
                .into_any_element()
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (window, cx);
            div().into_any_element()
        }
    }

    fn render_footer(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("app-footer")
            .w_full()
            .flex_shrink_0()
            .items_center()
            .py_2()
            .border_t_1()
            .border_color(theme.border)
            .child(
                Label::new(FOOTER_DISCLAIMER)
                    .text_xs()
                    .text_color(theme.muted_foreground),
            )
            .child(
                Label::new(FOOTER_VERIFY_NOTICE)
                    .text_xs()
                    .text_color(theme.muted_foreground),
            )
    }
}
