use image::imageops::FilterType;
use image::RgbImage;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, List, ListItem, Paragraph},
    Frame,
};

use crate::tui::app::App;

pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    if let Some(err) = &app.error {
        draw_error(f, err, chunks[1]);
    } else if app.summary.is_some() {
        draw_dashboard(f, app, chunks[1]);
    } else {
        draw_running(f, app, chunks[1]);
    }
    draw_footer(f, app, chunks[2]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let (status, status_color) = if app.error.is_some() {
        ("FAILED", Color::Red)
    } else if app.summary.is_some() {
        ("ANALYSIS COMPLETE", Color::Green)
    } else {
        ("DETECTING", Color::Cyan)
    };
    let filename = app
        .video
        .as_ref()
        .map(|v| v.filename())
        .unwrap_or_else(|| "Loading...".to_string());

    let mut spans = vec![
        Span::styled(
            format!(" Bike Counter - {status} "),
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("| {filename} | ")),
    ];
    if app.is_finished() {
        spans.extend([
            Span::styled("[Q]", Style::default().fg(Color::Red)),
            Span::raw("uit "),
        ]);
        if !app.snapshots().is_empty() {
            spans.extend([
                Span::styled("[←→]", Style::default().fg(Color::Cyan)),
                Span::raw("Snapshots"),
            ]);
        }
    } else {
        spans.extend([
            Span::styled("[Ctrl+C]", Style::default().fg(Color::Red)),
            Span::raw(" Abort"),
        ]);
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_running(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(8)])
        .split(area);

    let label = match app.total_frames {
        Some(total) => format!(
            "Frame: {}/{} ({:.1}%) | current: {} | inference: {:.1} ms",
            app.frames_done,
            total,
            app.progress_percentage(),
            app.latest_count,
            app.last_times.inference.as_secs_f64() * 1000.0
        ),
        None => format!(
            "Frame: {} | current: {} | inference: {:.1} ms",
            app.frames_done,
            app.latest_count,
            app.last_times.inference.as_secs_f64() * 1000.0
        ),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Detecting bikes"))
        .gauge_style(Style::default().fg(Color::Cyan))
        .label(label)
        .percent(app.progress_percentage() as u16);
    f.render_widget(gauge, chunks[0]);

    draw_chart(f, app, chunks[1]);
}

fn draw_chart(f: &mut Frame, app: &App, area: Rect) {
    let x_max = app.time_span();
    let y_max = f64::from(app.max_count.max(1)) + 1.0;

    let datasets = vec![Dataset::default()
        .name("bike_count")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&app.series)];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("📈 Bike Count Over Time"),
        )
        .x_axis(
            Axis::default()
                .title("timestamp_sec")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_max])
                .labels(vec![
                    "0".to_string(),
                    format!("{:.1}", x_max / 2.0),
                    format!("{x_max:.1}"),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("bike_count")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_max])
                .labels(vec![
                    "0".to_string(),
                    format!("{:.0}", y_max / 2.0),
                    format!("{y_max:.0}"),
                ]),
        );
    f.render_widget(chart, area);
}

fn draw_dashboard(f: &mut Frame, app: &mut App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    draw_chart(f, app, rows[0]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(25),
            Constraint::Percentage(45),
        ])
        .split(rows[1]);
    draw_highlights(f, app, cols[0]);
    draw_class_summary(f, app, cols[1]);
    draw_snapshot(f, app, cols[2]);
}

fn draw_highlights(f: &mut Frame, app: &App, area: Rect) {
    let Some(summary) = &app.summary else {
        return;
    };
    let avg = summary.times.avg(true);
    let text = vec![
        Line::from(Span::styled(
            format!("  📈 Peak Count:   {} bikes", summary.peak.record.bike_count),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "     At {:.2} sec (frame {})",
            summary.peak.record.timestamp_sec, summary.peak.frame_index
        )),
        Line::from(Span::styled(
            format!("  📉 Lowest Count: {} bikes", summary.trough.record.bike_count),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "     At {:.2} sec (frame {})",
            summary.trough.record.timestamp_sec, summary.trough.frame_index
        )),
        Line::from(""),
        Line::from(format!(
            "  Frames: {} ({:.2}s @ {:.2} fps)",
            summary.records.len(),
            summary.duration_sec(),
            summary.fps
        )),
        Line::from(format!("  Mean count: {:.2}", summary.mean_count())),
        Line::from(format!(
            "  Avg inference: {:.1} ms",
            avg.inference.as_secs_f64() * 1000.0
        )),
    ];
    let paragraph = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title("🚦 Detection Highlights"),
    );
    f.render_widget(paragraph, area);
}

fn draw_class_summary(f: &mut Frame, app: &App, area: Rect) {
    let Some(summary) = &app.summary else {
        return;
    };
    let ranked = summary.tally.ranked();
    let top = ranked.first().map(|e| e.count).unwrap_or(1).max(1);

    let mut items = vec![ListItem::new(Span::styled(
        summary.tally.to_string(),
        Style::default().fg(Color::Gray),
    ))];
    items.extend(ranked.iter().map(|entry| {
        let bar_width = (entry.count * 10 / top) as usize;
        ListItem::new(format!(
            "{:<12} {:<10} {}",
            entry.class_name,
            "█".repeat(bar_width),
            entry.count
        ))
    }));

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(format!(
        "🔎 Detected Class Summary (Total: {})",
        summary.total_detections()
    )));
    f.render_widget(list, area);
}

fn draw_snapshot(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("🖼️ Snapshot Frames with High Bike Count");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let captions = snapshot_captions(app);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(captions.len().max(1) as u16),
            Constraint::Min(0),
        ])
        .split(inner);
    if captions.is_empty() {
        f.render_widget(
            Paragraph::new("  No frame reached the snapshot threshold"),
            chunks[0],
        );
        return;
    }
    f.render_widget(Paragraph::new(captions), chunks[0]);

    let thumb = chunks[1];
    let lines = match app.thumbnail() {
        Ok(Some(image)) => half_block_lines(image, thumb.width, thumb.height),
        Ok(None) => Vec::new(),
        Err(e) => vec![Line::from(format!("  {e}"))],
    };
    f.render_widget(Paragraph::new(lines), thumb);
}

/// One caption per retained snapshot, the selected one highlighted.
fn snapshot_captions(app: &App) -> Vec<Line<'static>> {
    app.snapshots()
        .iter()
        .enumerate()
        .map(|(i, snap)| {
            let caption = format!("{}. {}", i + 1, snap.caption());
            if i == app.selected_snapshot {
                Line::from(Span::styled(
                    format!("▶ {caption}"),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(format!("  {caption}"))
            }
        })
        .collect()
}

/// Renders an image with `▀` cells: foreground is the upper pixel,
/// background the lower one, so each row of cells covers two pixel rows.
pub fn half_block_lines(image: &RgbImage, cols: u16, rows: u16) -> Vec<Line<'static>> {
    let (w, h) = image.dimensions();
    if cols == 0 || rows == 0 || w == 0 || h == 0 {
        return Vec::new();
    }
    let max_w = u32::from(cols);
    let max_h = u32::from(rows) * 2;
    let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    let tw = ((w as f64 * scale) as u32).clamp(1, max_w);
    let th = ((h as f64 * scale) as u32).clamp(1, max_h);
    let resized = image::imageops::resize(image, tw, th, FilterType::Triangle);

    (0..th)
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span<'static>> = (0..tw)
                .map(|x| {
                    let top = resized.get_pixel(x, y).0;
                    let bottom = if y + 1 < th {
                        resized.get_pixel(x, y + 1).0
                    } else {
                        [0, 0, 0]
                    };
                    Span::styled(
                        "▀",
                        Style::default()
                            .fg(Color::Rgb(top[0], top[1], top[2]))
                            .bg(Color::Rgb(bottom[0], bottom[1], bottom[2])),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn draw_error(f: &mut Frame, message: &str, area: Rect) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  ✗ {message}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Error"));
    f.render_widget(paragraph, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(artifacts) = &app.artifacts {
        format!(
            "Download JSON: {} | CSV: {} | Snapshots: {}",
            artifacts.json.display(),
            artifacts.csv.display(),
            artifacts.dir.display()
        )
    } else if app.error.is_some() {
        "Nothing was written.".to_string()
    } else {
        format!(
            "Processing frame {}... {} bikes in current frame | {} total",
            app.frames_done, app.latest_count, app.total_detections
        )
    };

    let footer = Paragraph::new(status)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Artifacts;
    use image::Rgb;
    use inference_common::bbox::Bbox;
    use inference_common::{CountConfig, Detection, FrameCounter};

    #[test]
    fn half_blocks_pair_pixel_rows() {
        let mut image = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        for x in 0..4 {
            for y in 2..4 {
                image.put_pixel(x, y, Rgb([0, 0, 255]));
            }
        }
        // fits exactly: 4 columns, 2 rows of cells
        let lines = half_block_lines(&image, 4, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans.len(), 4);
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Rgb(255, 0, 0)));
        assert_eq!(lines[1].spans[0].style.bg, Some(Color::Rgb(0, 0, 255)));
    }

    fn finished_app(counts: &[usize]) -> App {
        let mut counter = FrameCounter::new(2.0, CountConfig::default()).unwrap();
        let frame = RgbImage::new(8, 8);
        for &n in counts {
            let dets: Vec<Detection> = (0..n)
                .map(|_| Detection {
                    class_id: 1,
                    confidence: 0.5,
                    bbox: Bbox::new(0.0, 0.0, 2.0, 2.0),
                })
                .collect();
            counter.push(&frame, &dets).unwrap();
        }
        let mut app = App::new();
        app.finish(&counter.finish().unwrap(), &Artifacts::default());
        app
    }

    fn text(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.to_string()).collect()
    }

    #[test]
    fn every_snapshot_caption_is_listed() {
        let mut app = finished_app(&[3, 5, 0, 4]);
        app.next_snapshot();

        let captions = snapshot_captions(&app);
        let texts: Vec<String> = captions.iter().map(text).collect();
        assert_eq!(
            texts,
            vec![
                "  1. 5 bikes @ 0.50s",
                "▶ 2. 4 bikes @ 1.50s",
                "  3. 3 bikes @ 0.00s",
            ]
        );
        assert_eq!(captions[1].spans[0].style.fg, Some(Color::Cyan));
        assert_eq!(captions[0].spans[0].style.fg, None);
    }

    #[test]
    fn no_captions_without_snapshots() {
        let app = finished_app(&[0, 1, 2]);
        assert!(snapshot_captions(&app).is_empty());
    }

    #[test]
    fn half_blocks_empty_area() {
        let image = RgbImage::new(4, 4);
        assert!(half_block_lines(&image, 0, 5).is_empty());
    }
}
