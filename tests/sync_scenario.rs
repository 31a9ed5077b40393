use std::sync::Arc;

use resvg::usvg;
use twinview::bus::{BusMessage, Channel, ChangeEvent, LocalBus, TabCreatedEvent};
use twinview::config::{Config, EditorConfig};
use twinview::editor::{EditorCommand, EditorHost, EditorSession};
use twinview::renderer::SvgRenderer;
use twinview::sinks::{HeadlessWindow, MemoryBrowser, MemoryClipboard, MemoryFiles};
use twinview::tabs::TabId;
use twinview::viewer::{ViewerCommand, ViewerHost, ViewerSession};

const DIAGRAM: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 300 200"><rect x="10" y="10" width="100" height="50" fill="#000000"/></svg>"##;

fn editor_host() -> EditorHost {
    EditorHost {
        clipboard: Box::new(MemoryClipboard::new()),
        browser: Box::new(MemoryBrowser::new()),
    }
}

fn viewer(files: MemoryFiles) -> ViewerSession<SvgRenderer> {
    let renderer = SvgRenderer::with_fontdb(Arc::new(usvg::fontdb::Database::new()), (800.0, 600.0));
    let host = ViewerHost {
        clipboard: Box::new(MemoryClipboard::new()),
        files: Box::new(files),
        window: Box::new(HeadlessWindow::default()),
    };
    ViewerSession::new(&Config::default(), renderer, host)
}

#[test]
fn change_before_announcement_converges_to_two_tabs() {
    let bus = LocalBus::new();
    let inbox = bus.subscribe(&Channel::ALL);
    let mut editor = EditorSession::new(EditorConfig::default(), bus, editor_host());
    let mut viewer = viewer(MemoryFiles::new());
    let template = EditorConfig::default().new_tab_template;

    let id = editor.create_tab();
    assert_eq!(id, TabId(2));

    let mut messages = inbox.drain();
    assert_eq!(
        messages,
        vec![
            BusMessage::TabCreated(TabCreatedEvent {
                id: TabId(2),
                name: "Diagram 2".to_string(),
                content: template.clone(),
            }),
            BusMessage::ContentChanged(ChangeEvent {
                tab_id: TabId(2),
                content: template.clone(),
            }),
        ]
    );

    // Deliver the change first, as if the announcement lost the race.
    messages.reverse();
    for message in messages {
        viewer.handle_message(message);
    }

    assert_eq!(viewer.tabs().ids(), vec![TabId(1), TabId(2)]);
    assert_eq!(viewer.tabs().content(TabId(2)), Some(template.as_str()));
    assert_eq!(
        viewer.tabs().get(TabId(2)).map(|t| t.name.as_str()),
        Some("Diagram 2")
    );
    // The viewer keeps its own selection.
    assert_eq!(viewer.active(), TabId(1));
}

#[test]
fn typing_in_the_editor_updates_the_viewer_and_exports() {
    let bus = LocalBus::new();
    let inbox = bus.subscribe(&Channel::ALL);
    let mut editor = EditorSession::new(EditorConfig::default(), bus, editor_host());
    let files = MemoryFiles::new();
    let mut viewer = viewer(files.clone());

    editor.dispatch(EditorCommand::Input("not yet svg".to_string())).expect("input");
    editor.dispatch(EditorCommand::Input(DIAGRAM.to_string())).expect("input");
    assert_eq!(viewer.pump(&inbox), 2);

    assert_eq!(viewer.tabs().content(TabId(1)), Some(DIAGRAM));
    assert_eq!(viewer.status(), None);
    assert!(viewer.drawing().is_some());

    viewer.dispatch(ViewerCommand::Export).expect("export");
    assert!(files.get("inbox_diagram.svg").is_some());
    assert!(files.get("inbox.html").is_some());
}

#[test]
fn late_viewer_catches_up_through_announce() {
    let bus = LocalBus::new();
    let mut editor = EditorSession::new(EditorConfig::default(), bus.clone(), editor_host());
    editor.input(DIAGRAM).expect("input");

    // The viewer subscribes after the edit was published.
    let inbox = bus.subscribe(&Channel::ALL);
    let mut viewer = viewer(MemoryFiles::new());
    assert_eq!(viewer.pump(&inbox), 0);
    assert_ne!(viewer.tabs().content(TabId(1)), Some(DIAGRAM));

    editor.announce();
    viewer.pump(&inbox);
    assert_eq!(viewer.tabs().content(TabId(1)), Some(DIAGRAM));
    assert!(viewer.drawing().is_some());
}
