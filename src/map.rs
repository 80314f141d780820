pub(crate) const INDEX_HTML: &str = r#"<!DOCTYPE html>
  <html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0"/>
    <title>Sea Ice Forecast Viewer</title>
    <link
      rel="stylesheet"
      href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"
      integrity="sha256-p4NxAoJBhIIN+hmNHrzRCf9tD/miZyoHS5obTRR9BMY="
      crossorigin=""
    />
    <style>
      html, body { height: 100%; margin: 0; padding: 0; font-family: sans-serif; font-size: 13px; }
      #controls {
        position: absolute;
        top: 12px;
        left: 50px;
        z-index: 1000;
        background: white;
        padding: 8px;
        border-radius: 4px;
        box-shadow: 0 1px 4px rgba(0,0,0,0.3);
        width: 280px;
        line-height: 26px;
      }
      #controls select, #controls input[type=date] { width: 100%; }
      #controls input[type=number] { width: 70px; }
      #leadtimeMarks { display: flex; justify-content: space-between; font-size: 10px; color: #555; }
      #legend {
        position: absolute;
        bottom: 24px;
        right: 12px;
        z-index: 1000;
        background: white;
        padding: 6px;
        border-radius: 4px;
        box-shadow: 0 1px 4px rgba(0,0,0,0.3);
        width: 260px;
      }
      #colourbar { height: 14px; width: 100%; }
      #legendBounds { display: flex; justify-content: space-between; }
      #map { height: 100%; width: 100%; }
    </style>
  </head>
  <body>
    <div id="controls">
      <label for="collectionSelect">Collections: </label>
      <select id="collectionSelect" multiple size="3"></select>
      <label for="initDate">Forecast initialisation: </label>
      <input type="date" id="initDate" />
      <div id="dateWarning" style="color: #b00; display: none;">No forecast starts on that day</div>
      <label for="leadtimeSlider">Lead time: <span id="leadtimeValue">0</span></label>
      <input type="range" id="leadtimeSlider" min="0" max="0" step="1" value="0" style="width: 100%;" disabled />
      <div id="leadtimeMarks"></div>
      <label for="bandSelect">Variable: </label>
      <select id="bandSelect"></select>
      <label for="colormapSelect">Colormap: </label>
      <select id="colormapSelect"></select>
      <label for="opacitySlider">Opacity: </label>
      <input type="range" id="opacitySlider" min="0" max="1" step="0.1" value="1" />
      <br />
      <label>
        <input type="checkbox" id="fixRange" />
        Fix range
      </label>
      <input type="number" id="fixedMin" step="any" disabled />
      <input type="number" id="fixedMax" step="any" disabled />
    </div>

    <div id="legend">
      <canvas id="colourbar" width="256" height="1"></canvas>
      <div id="legendBounds"><span id="legendMin">0</span><span id="legendMax">1</span></div>
    </div>

    <div id="map"></div>

    <script
      src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"
      integrity="sha256-20nQCchB9co0qIjJZRGuk2/Z9VM+kNiyxNV1lvTlZBo="
      crossorigin=""
    ></script>

    <script>
      const $ = id => document.getElementById(id);
      const map = L.map('map').setView([70, 0], 3);

      L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
        maxZoom: 19,
        attribution: '&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors'
      }).addTo(map);

      const layerControl = L.control.layers(null, {}, { collapsed: false }).addTo(map);
      let tileLayers = [];
      let sessionId = null;
      let disabledDates = new Set();

      async function send(event) {
        const res = await fetch(`/sessions/${sessionId}/events`, {
          method: 'POST',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify(event),
        });
        if (!res.ok) {
          console.warn((await res.json()).error);
          return;
        }
        applyPatch(await res.json());
      }

      function applyPatch(patch) {
        // Superseded by a newer event; its own response carries the outputs.
        if (patch.stale) return;
        if (patch.error) console.warn(patch.error);
        if (patch.dates) setDates(patch.dates);
        if (patch.slider) setSlider(patch.slider);
        if (patch.bands) setBands(patch.bands);
        if (patch.layers) setLayers(patch.layers);
        if (patch.legend) setLegend(patch.legend);
        if (patch.range_inputs) setRangeInputs(patch.range_inputs);
        if (patch.opacity !== undefined) {
          tileLayers.forEach(l => l.setOpacity(patch.opacity));
        }
      }

      function setDates(dates) {
        $('initDate').min = dates.min_date || '';
        $('initDate').max = dates.max_date || '';
        disabledDates = new Set(dates.disabled_dates);
      }

      function setSlider(slider) {
        const s = $('leadtimeSlider');
        s.min = slider.min;
        s.max = slider.max;
        s.disabled = slider.disabled;
        $('leadtimeMarks').innerHTML = slider.marks
          .map(m => `<span>${m.label}</span>`)
          .join('');
      }

      function setBands(bands) {
        const select = $('bandSelect');
        select.innerHTML = '';
        bands.forEach(({ label, value }) => {
          const opt = document.createElement('option');
          opt.value = value;
          opt.textContent = label;
          select.appendChild(opt);
        });
      }

      function setLayers(layers) {
        tileLayers.forEach(l => {
          layerControl.removeLayer(l);
          map.removeLayer(l);
        });
        tileLayers = layers.map(layer => {
          const tl = L.tileLayer(layer.url, {
            maxZoom: 18,
            tileSize: 256,
            opacity: layer.opacity,
          }).addTo(map);
          tl.setZIndex(1 + layer.index);
          layerControl.addOverlay(tl, layer.name);
          return tl;
        });
      }

      function setLegend(legend) {
        const ctx = $('colourbar').getContext('2d');
        const width = $('colourbar').width;
        legend.colorscale.forEach((stop, i) => {
          ctx.fillStyle = `rgba(${stop.red},${stop.green},${stop.blue},${stop.alpha})`;
          ctx.fillRect(i * width / legend.colorscale.length, 0, width / legend.colorscale.length + 1, 1);
        });
        $('legendMin').textContent = (+legend.min).toFixed(2);
        $('legendMax').textContent = (+legend.max).toFixed(2);
      }

      function setRangeInputs(inputs) {
        $('fixRange').checked = inputs.enabled;
        $('fixedMin').disabled = !inputs.enabled;
        $('fixedMax').disabled = !inputs.enabled;
        $('fixedMin').value = inputs.min;
        $('fixedMax').value = inputs.max;
      }

      async function init() {
        const [collections, colormaps, session] = await Promise.all([
          fetch('/collections').then(r => r.json()),
          fetch('/colormaps').then(r => r.json()),
          fetch('/sessions', { method: 'POST' }).then(r => r.json()),
        ]);
        sessionId = session.id;

        collections.forEach(c => {
          const opt = document.createElement('option');
          opt.value = c;
          opt.textContent = c;
          $('collectionSelect').appendChild(opt);
        });
        colormaps.names.forEach(name => {
          const opt = document.createElement('option');
          opt.value = name;
          opt.textContent = name;
          opt.selected = name === session.selection.colormap;
          $('colormapSelect').appendChild(opt);
        });

        const colormap = localStorage.getItem('colormap');
        const opacity = localStorage.getItem('opacity');
        applyPatch({ stale: false, ...session.state });
        if (colormap && colormap !== session.selection.colormap) {
          $('colormapSelect').value = colormap;
          await send({ type: 'set_colormap', value: colormap });
        }
        if (opacity !== null) {
          $('opacitySlider').value = opacity;
          await send({ type: 'set_opacity', value: parseFloat(opacity) });
        }
        await send({ type: 'resize', value: window.innerWidth });
      }

      $('collectionSelect').addEventListener('change', () => {
        const selected = Array.from($('collectionSelect').selectedOptions).map(o => o.value);
        send({ type: 'set_collections', value: selected });
      });

      $('initDate').addEventListener('change', () => {
        const date = $('initDate').value || null;
        $('dateWarning').style.display = date && disabledDates.has(date) ? 'block' : 'none';
        send({ type: 'set_init_date', value: date });
      });

      $('leadtimeSlider').addEventListener('input', () => {
        $('leadtimeValue').textContent = $('leadtimeSlider').value;
        send({ type: 'set_leadtime', value: parseInt($('leadtimeSlider').value, 10) });
      });

      $('bandSelect').addEventListener('change', () => {
        send({ type: 'set_band', value: parseInt($('bandSelect').value, 10) });
      });

      $('colormapSelect').addEventListener('change', () => {
        localStorage.setItem('colormap', $('colormapSelect').value);
        send({ type: 'set_colormap', value: $('colormapSelect').value });
      });

      $('opacitySlider').addEventListener('input', () => {
        localStorage.setItem('opacity', $('opacitySlider').value);
        send({ type: 'set_opacity', value: parseFloat($('opacitySlider').value) });
      });

      $('fixRange').addEventListener('change', () => send({ type: 'toggle_fix_range' }));
      $('fixedMin').addEventListener('change', () => {
        send({ type: 'set_fixed_min', value: parseFloat($('fixedMin').value) });
      });
      $('fixedMax').addEventListener('change', () => {
        send({ type: 'set_fixed_max', value: parseFloat($('fixedMax').value) });
      });

      let resizeTimer;
      window.addEventListener('resize', () => {
        clearTimeout(resizeTimer);
        resizeTimer = setTimeout(() => send({ type: 'resize', value: window.innerWidth }), 250);
      });

      init().catch(console.error);
    </script>
  </body>
  </html>
"#;
