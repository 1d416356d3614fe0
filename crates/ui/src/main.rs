use gpui::*;
use gpui_component::{Root, ThemeRegistry};

use geomentor::app::{ChangeApiKey, GeoMentorShell, Quit, ToggleTheme, default_themes_path};
use geomentor::settings::SettingsStore;

/// Application entry point.
///
/// Bootstraps assets, gpui-component, the tokio bridge used for provider IO and the
/// theme pipeline, then opens the tutor window wrapped in `Root`.
fn main() {
    tracing_subscriber::fmt::init();

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(|cx| {
        gpui_tokio_bridge::init(cx);
        gpui_component::init(cx);

        // A missing themes directory is not fatal; built-in themes remain available.
        if let Err(err) = ThemeRegistry::watch_dir(default_themes_path(), cx, |cx| {
            SettingsStore::load().settings().apply_theme(None, cx);
            tracing::info!("theme directory watch initialized");
        }) {
            tracing::warn!(
                "failed to watch themes directory: {}. using default themes.",
                err
            );
            SettingsStore::load().settings().apply_theme(None, cx);
        }

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([
            KeyBinding::new("secondary-q", Quit, None),
            KeyBinding::new("secondary-shift-k", ChangeApiKey, None),
            KeyBinding::new("secondary-shift-t", ToggleTheme, None),
        ]);

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(960.), px(800.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        title: Some(SharedString::from(geomentor::app::APP_TITLE)),
                        appears_transparent: true,
                        traffic_light_position: Some(point(px(9.), px(9.))),
                        ..Default::default()
                    }),
                    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
                    window_decorations: Some(WindowDecorations::Client),
                    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
                    window_decorations: None,
                    ..Default::default()
                };

                let opened = cx.open_window(options, |window, cx| {
                    let settings = SettingsStore::load();
                    let shell = cx.new(|cx| GeoMentorShell::new(settings, window, cx));
                    cx.new(|cx| Root::new(shell, window, cx))
                });

                match opened {
                    Ok(_) => cx.activate(true),
                    Err(error) => {
                        tracing::error!(error = %error, "failed to open main window");
                        cx.quit();
                    }
                }
            })
        })
        .detach();
    });
}
